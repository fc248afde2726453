//! The requeue handler and its configuration.

use crate::error::{BoxError, ConfigError, RequeueError};
use crate::message::Message;
use crate::pubsub::{Publisher, Subscriber};
use crate::retry::increment_retry_count;
use crate::topic::GeneratePublishTopic;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a `Requeue`.
///
/// Use the `RequeueConfig::builder()` method to construct this struct. Required
/// fields are checked by [`Requeue::new`], not by the builder.
#[derive(Clone)]
pub struct RequeueConfig {
    /// The subscriber to consume messages from. Required.
    pub subscriber: Option<Arc<dyn Subscriber>>,
    /// The topic on `subscriber` to consume messages from. Required.
    pub subscribe_topic: String,
    /// The publisher requeued messages are sent with. Required.
    pub publisher: Option<Arc<dyn Publisher>>,
    /// Picks the topic each requeued message is published to. Required.
    pub generate_publish_topic: Option<GeneratePublishTopic>,
    /// How long to wait before republishing. Zero means no delay.
    ///
    /// Avoid setting this to a very high value, as it holds up the processing of the message.
    pub delay: Duration,
    /// How many messages `Requeue::run` processes concurrently. 0 is treated as 1.
    pub max_in_flight: usize,
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            subscriber: None,
            subscribe_topic: String::new(),
            publisher: None,
            generate_publish_topic: None,
            delay: Duration::ZERO,
            max_in_flight: 1,
        }
    }
}

impl RequeueConfig {
    /// Creates a new `RequeueConfigBuilder` to start building the configuration.
    pub fn builder() -> RequeueConfigBuilder {
        RequeueConfigBuilder::default()
    }
}

impl fmt::Debug for RequeueConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequeueConfig")
            .field("subscriber", &self.subscriber.is_some())
            .field("subscribe_topic", &self.subscribe_topic)
            .field("publisher", &self.publisher.is_some())
            .field("generate_publish_topic", &self.generate_publish_topic.is_some())
            .field("delay", &self.delay)
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

/// A builder for creating `RequeueConfig` instances.
#[derive(Default)]
pub struct RequeueConfigBuilder {
    config: RequeueConfig,
}

impl RequeueConfigBuilder {
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.config.subscriber = Some(subscriber);
        self
    }

    pub fn subscribe_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.subscribe_topic = topic.into();
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.config.publisher = Some(publisher);
        self
    }

    /// Sets the function choosing the destination topic.
    /// It could be a constant, or taken from the message's metadata; see [`crate::topic`].
    pub fn generate_publish_topic<F>(mut self, generate: F) -> Self
    where
        F: Fn(&Message) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        self.config.generate_publish_topic = Some(Arc::new(generate));
        self
    }

    /// Sets the delay before republishing.
    /// Defaults to zero (no delay).
    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    /// Sets how many messages are requeued concurrently by `Requeue::run`.
    /// Defaults to 1.
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.config.max_in_flight = max_in_flight;
        self
    }

    /// Builds the final `RequeueConfig`. Missing required fields are reported by `Requeue::new`.
    pub fn build(self) -> RequeueConfig {
        self.config
    }
}

/// Delays, counts and republishes messages consumed from one topic.
///
/// The handler keeps no state between messages, so one instance can process
/// any number of messages concurrently.
pub struct Requeue {
    pub(crate) subscriber: Arc<dyn Subscriber>,
    subscribe_topic: String,
    publisher: Arc<dyn Publisher>,
    generate_publish_topic: GeneratePublishTopic,
    delay: Duration,
    pub(crate) max_in_flight: usize,
}

impl Requeue {
    /// Validates `config` and creates the handler. Does not touch the network.
    pub fn new(config: RequeueConfig) -> Result<Self, RequeueError> {
        let RequeueConfig {
            subscriber,
            subscribe_topic,
            publisher,
            generate_publish_topic,
            delay,
            max_in_flight,
        } = config;

        let subscriber = subscriber.ok_or(ConfigError::MissingSubscriber)?;
        if subscribe_topic.is_empty() {
            return Err(ConfigError::MissingSubscribeTopic.into());
        }
        let publisher = publisher.ok_or(ConfigError::MissingPublisher)?;
        let generate_publish_topic =
            generate_publish_topic.ok_or(ConfigError::MissingGeneratePublishTopic)?;

        Ok(Self {
            subscriber,
            subscribe_topic,
            publisher,
            generate_publish_topic,
            delay,
            max_in_flight: max_in_flight.max(1),
        })
    }

    pub fn subscribe_topic(&self) -> &str {
        &self.subscribe_topic
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Requeues a single message.
    ///
    /// Waits out the configured delay (aborting with [`RequeueError::Cancelled`] if the
    /// message's context is cancelled first), resolves the destination topic, increments
    /// the retry counter in place and publishes the message.
    ///
    /// Every error is returned as-is. The counter increment is not undone when
    /// publishing fails; the caller should nack so the original copy is redelivered.
    pub async fn process(&self, msg: &mut Message) -> Result<(), RequeueError> {
        if !self.delay.is_zero() {
            tokio::select! {
                biased;
                _ = msg.context().cancelled() => return Err(RequeueError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        let topic = (self.generate_publish_topic)(&*msg).map_err(RequeueError::TopicResolution)?;

        increment_retry_count(msg);

        self.publisher
            .publish(&topic, &*msg)
            .await
            .map_err(RequeueError::Publish)
    }
}

impl fmt::Debug for Requeue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requeue")
            .field("subscribe_topic", &self.subscribe_topic)
            .field("delay", &self.delay)
            .field("max_in_flight", &self.max_in_flight)
            .finish_non_exhaustive()
    }
}
