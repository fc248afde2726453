#![allow(dead_code)]

use async_trait::async_trait;
use rabbitmq_requeue::{Acknowledger, BoxError, Incoming, Message, MessageStream, Publisher, Subscriber};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Publisher that records every call and can be told to fail.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Message)>>,
    failure: Mutex<Option<String>>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        let publisher = Self::default();
        *publisher.failure.lock().unwrap() = Some(reason.to_string());
        Arc::new(publisher)
    }

    pub fn published(&self) -> Vec<(String, Message)> {
        self.published.lock().unwrap().clone()
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, message: &Message) -> Result<(), BoxError> {
        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(reason.into());
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), message.clone()));
        Ok(())
    }
}

/// Subscriber fed through a channel. Dropping the sender ends the stream.
pub struct ChannelSubscriber {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Result<Incoming, BoxError>>>>,
    topics: Mutex<Vec<String>>,
}

impl ChannelSubscriber {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<Result<Incoming, BoxError>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscriber = Self {
            receiver: Mutex::new(Some(receiver)),
            topics: Mutex::new(Vec::new()),
        };
        (Arc::new(subscriber), sender)
    }

    pub fn subscribed_topics(&self) -> Vec<String> {
        self.topics.lock().unwrap().clone()
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    async fn subscribe(&self, topic: &str) -> Result<MessageStream, BoxError> {
        self.topics.lock().unwrap().push(topic.to_string());
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or("already subscribed")?;

        let stream = futures_util::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|item| (item, receiver))
        });
        Ok(Box::pin(stream))
    }
}

/// Subscriber whose `subscribe` always fails.
pub struct BrokenSubscriber;

#[async_trait]
impl Subscriber for BrokenSubscriber {
    async fn subscribe(&self, _topic: &str) -> Result<MessageStream, BoxError> {
        Err("connection refused".into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Nack,
}

/// Shared log of how each message (by uuid) was settled.
pub type Settlements = Arc<Mutex<Vec<(String, Settlement)>>>;

pub struct RecordingAcknowledger {
    uuid: String,
    settlements: Settlements,
}

#[async_trait]
impl Acknowledger for RecordingAcknowledger {
    async fn ack(&self) -> Result<(), BoxError> {
        self.settlements
            .lock()
            .unwrap()
            .push((self.uuid.clone(), Settlement::Ack));
        Ok(())
    }

    async fn nack(&self) -> Result<(), BoxError> {
        self.settlements
            .lock()
            .unwrap()
            .push((self.uuid.clone(), Settlement::Nack));
        Ok(())
    }
}

pub fn incoming(message: Message, settlements: &Settlements) -> Incoming {
    let acknowledger = RecordingAcknowledger {
        uuid: message.uuid.clone(),
        settlements: settlements.clone(),
    };
    Incoming::new(message, acknowledger)
}
