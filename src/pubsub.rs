//! Traits for the transport collaborators the requeue handler depends on.

use crate::error::BoxError;
use crate::message::Message;
use async_trait::async_trait;
use futures_util::stream::BoxStream;

/// Sends messages to a topic.
///
/// The delivery guarantee (at-least-once, exactly-once...) is whatever the
/// implementation provides; the requeue handler does not strengthen it.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `message` to `topic`.
    ///
    /// # Returns
    /// `Ok(())` once the transport has accepted the message.
    async fn publish(&self, topic: &str, message: &Message) -> Result<(), BoxError>;
}

/// Acknowledges or rejects a single delivered message with its transport.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Marks the message as processed; it will not be delivered again.
    async fn ack(&self) -> Result<(), BoxError>;

    /// Rejects the message so the transport redelivers the original copy.
    async fn nack(&self) -> Result<(), BoxError>;
}

/// A delivered message together with the handle used to settle it.
pub struct Incoming {
    pub message: Message,
    pub acknowledger: Box<dyn Acknowledger>,
}

impl Incoming {
    pub fn new(message: Message, acknowledger: impl Acknowledger + 'static) -> Self {
        Self {
            message,
            acknowledger: Box::new(acknowledger),
        }
    }
}

/// Stream of deliveries returned by [`Subscriber::subscribe`].
pub type MessageStream = BoxStream<'static, Result<Incoming, BoxError>>;

/// Supplies messages from a named topic.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Starts consuming `topic`.
    ///
    /// The stream ends when the subscription is closed by the transport.
    async fn subscribe(&self, topic: &str) -> Result<MessageStream, BoxError>;
}
