//! Choosing the topic a requeued message is published to.

use crate::error::{BoxError, TopicError};
use crate::message::Message;
use std::sync::Arc;

/// Computes the destination topic for a message.
///
/// Called once per message, synchronously, before the retry counter is touched.
/// It only gets a shared reference and so cannot modify the message.
pub type GeneratePublishTopic = Arc<dyn Fn(&Message) -> Result<String, BoxError> + Send + Sync>;

/// Always publishes to `topic`.
pub fn constant_topic(topic: &str) -> impl Fn(&Message) -> Result<String, BoxError> + Send + Sync + 'static {
    let topic = topic.to_string();
    move |_msg: &Message| Ok(topic.clone())
}

/// Publishes to the topic named by the metadata value under `key`.
///
/// Fails with [`TopicError::MissingMetadata`] when the key is absent or empty.
pub fn topic_from_metadata(key: &str) -> impl Fn(&Message) -> Result<String, BoxError> + Send + Sync + 'static {
    let key = key.to_string();
    move |msg: &Message| match msg.metadata.get(&key) {
        Some(topic) if !topic.is_empty() => Ok(topic.to_string()),
        _ => Err(Box::new(TopicError::MissingMetadata(key.clone())) as BoxError),
    }
}
