//! RabbitMQ implementations of [`Publisher`] and [`Subscriber`] built on `lapin`.
//!
//! Topics map onto AMQP routing keys when publishing and onto queue names when
//! subscribing. Message metadata travels as AMQP headers and the message UUID as
//! the `message_id` property.

use crate::error::BoxError;
use crate::message::{Message, Metadata};
use crate::pubsub::{Acknowledger, Incoming, MessageStream, Publisher, Subscriber};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    message::Delivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable},
    BasicProperties, Channel,
};
use uuid::Uuid;

/// Publishes messages to an exchange, using the topic as routing key.
///
/// With the default exchange (`""`) the topic is the name of the destination queue.
#[derive(Clone)]
pub struct AmqpPublisher {
    channel: Channel,
    exchange: String,
}

impl AmqpPublisher {
    pub fn new(channel: Channel, exchange: impl Into<String>) -> Self {
        Self {
            channel,
            exchange: exchange.into(),
        }
    }
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn publish(&self, topic: &str, message: &Message) -> Result<(), BoxError> {
        let properties = BasicProperties::default()
            .with_message_id(message.uuid.clone().into())
            .with_headers(metadata_to_headers(&message.metadata));

        // Resolves immediately unless the channel is in confirm mode.
        let confirmation = self
            .channel
            .basic_publish(
                &self.exchange,
                topic,
                BasicPublishOptions::default(),
                &message.payload,
                properties,
            )
            .await?
            .await?;

        if confirmation.is_nack() {
            return Err(format!("broker rejected message {} published to '{}'", message.uuid, topic).into());
        }
        Ok(())
    }
}

/// Consumes messages from the durable queue named after the subscribed topic.
#[derive(Clone)]
pub struct AmqpSubscriber {
    channel: Channel,
    consumer_tag: String,
    prefetch_count: u16,
}

impl AmqpSubscriber {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            consumer_tag: String::new(),
            prefetch_count: 1,
        }
    }

    /// Sets a custom consumer tag.
    /// Defaults to `{topic}_requeue`.
    pub fn consumer_tag(mut self, consumer_tag: impl Into<String>) -> Self {
        self.consumer_tag = consumer_tag.into();
        self
    }

    /// Sets the number of unacknowledged messages the broker may push (QoS prefetch count).
    /// Defaults to 1. Should be at least the requeue's `max_in_flight`.
    pub fn prefetch_count(mut self, count: u16) -> Self {
        self.prefetch_count = count;
        self
    }
}

#[async_trait]
impl Subscriber for AmqpSubscriber {
    async fn subscribe(&self, topic: &str) -> Result<MessageStream, BoxError> {
        self.channel
            .queue_declare(
                topic,
                QueueDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;

        self.channel
            .basic_qos(self.prefetch_count, BasicQosOptions::default())
            .await?;

        let consumer_tag = if self.consumer_tag.is_empty() {
            format!("{}_requeue", topic)
        } else {
            self.consumer_tag.clone()
        };

        let consumer = self
            .channel
            .basic_consume(
                topic,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        log::info!(
            "Consumer started on queue '{}' with tag '{}' (prefetch: {}).",
            topic,
            consumer.tag().as_str(),
            self.prefetch_count
        );

        let stream = consumer.map(|delivery| -> Result<Incoming, BoxError> {
            Ok(incoming_from_delivery(delivery?))
        });
        Ok(Box::pin(stream))
    }
}

/// Settles a delivery with the broker. Nacked deliveries are requeued.
struct AmqpAcknowledger {
    delivery: Delivery,
}

#[async_trait]
impl Acknowledger for AmqpAcknowledger {
    async fn ack(&self) -> Result<(), BoxError> {
        self.delivery.ack(BasicAckOptions::default()).await?;
        Ok(())
    }

    async fn nack(&self) -> Result<(), BoxError> {
        self.delivery
            .nack(BasicNackOptions { requeue: true, ..Default::default() })
            .await?;
        Ok(())
    }
}

fn incoming_from_delivery(mut delivery: Delivery) -> Incoming {
    let uuid = delivery
        .properties
        .message_id()
        .as_ref()
        .map(|id| id.as_str().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let metadata = metadata_from_headers(delivery.properties.headers().as_ref());
    let payload = std::mem::take(&mut delivery.data);

    let message = Message::with_uuid(uuid, payload).with_metadata(metadata);
    Incoming::new(message, AmqpAcknowledger { delivery })
}

/// Encodes metadata as AMQP headers, one long string per entry.
pub fn metadata_to_headers(metadata: &Metadata) -> FieldTable {
    let mut headers = FieldTable::default();
    for (key, value) in metadata {
        headers.insert(key.clone().into(), AMQPValue::LongString(value.clone().into()));
    }
    headers
}

/// Decodes AMQP headers into metadata.
///
/// Strings are kept as-is, numbers and booleans are rendered in base 10 / `true`/`false`.
/// Nested tables, arrays and other binary values are dropped.
pub fn metadata_from_headers(headers: Option<&FieldTable>) -> Metadata {
    let Some(headers) = headers else {
        return Metadata::new();
    };

    headers
        .inner()
        .iter()
        .filter_map(|(key, value)| header_to_string(value).map(|value| (key.as_str().to_string(), value)))
        .collect()
}

fn header_to_string(value: &AMQPValue) -> Option<String> {
    match value {
        AMQPValue::LongString(s) => Some(s.to_string()),
        AMQPValue::ShortString(s) => Some(s.as_str().to_string()),
        AMQPValue::Boolean(b) => Some(b.to_string()),
        AMQPValue::ShortShortInt(n) => Some(n.to_string()),
        AMQPValue::ShortShortUInt(n) => Some(n.to_string()),
        AMQPValue::ShortInt(n) => Some(n.to_string()),
        AMQPValue::ShortUInt(n) => Some(n.to_string()),
        AMQPValue::LongInt(n) => Some(n.to_string()),
        AMQPValue::LongUInt(n) => Some(n.to_string()),
        AMQPValue::LongLongInt(n) => Some(n.to_string()),
        AMQPValue::Timestamp(t) => Some(t.to_string()),
        _ => None,
    }
}
