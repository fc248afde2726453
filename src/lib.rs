//! # RabbitMQ Requeue
//! Delays failed messages, counts how many times they were retried, and republishes
//! them to a topic chosen per message.
//!
//! The retry count travels in message metadata under [`RETRIES_KEY`] as a base-10 string.
//! Delivery is at-least-once: the source message is only acked after the republish succeeded.

pub mod amqp;
pub mod error;
pub mod message;
pub mod pubsub;
pub mod requeue;
pub mod retry;
pub mod topic;
mod worker;

// Re-export key components for easy access
pub use amqp::{AmqpPublisher, AmqpSubscriber};
pub use error::{BoxError, ConfigError, RequeueError, TopicError};
pub use message::{Message, Metadata};
pub use pubsub::{Acknowledger, Incoming, MessageStream, Publisher, Subscriber};
pub use requeue::{Requeue, RequeueConfig, RequeueConfigBuilder};
pub use retry::{get_retry_count, increment_retry_count, set_retry_count, RETRIES_KEY};
pub use topic::{constant_topic, topic_from_metadata, GeneratePublishTopic};
pub use tokio_util::sync::CancellationToken;
