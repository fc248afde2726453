use thiserror::Error;

/// Boxed error returned by external collaborators (publishers, subscribers, topic generators).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A required field was not set on `RequeueConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("subscriber is required")]
    MissingSubscriber,

    #[error("subscribe topic is required")]
    MissingSubscribeTopic,

    #[error("publisher is required")]
    MissingPublisher,

    #[error("generate publish topic is required")]
    MissingGeneratePublishTopic,
}

/// Error type for the requeue library.
#[derive(Debug, Error)]
pub enum RequeueError {
    /// Construction was rejected; no `Requeue` instance exists.
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The message's context was cancelled while waiting out the delay.
    /// Nothing was mutated or published.
    #[error("message context cancelled before the requeue delay elapsed")]
    Cancelled,

    /// The topic generator failed. The message was left untouched.
    #[error(transparent)]
    TopicResolution(BoxError),

    /// The publisher failed. The retry counter was already incremented on the in-memory message.
    #[error(transparent)]
    Publish(BoxError),

    /// The subscriber could not be attached or its stream failed.
    #[error("subscription failed: {0}")]
    Subscribe(BoxError),
}

impl RequeueError {
    /// `true` if the error came from the delay stage being cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RequeueError::Cancelled)
    }
}

/// Error returned by the topic generator helpers in [`crate::topic`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("metadata key '{0}' is missing or empty")]
    MissingMetadata(String),
}
