//! The message envelope passed between subscribers, the requeue handler and publishers.

use std::collections::btree_map::{self, BTreeMap};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// String-to-string message metadata, kept in key order.
///
/// Values are plain strings so they survive any transport; typed values such as the
/// retry counter are read and written through the accessors in [`crate::retry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, or `None` if absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Sets `key` to `value`, overwriting any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        metadata.extend(iter);
        metadata
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Metadata {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An opaque payload with metadata and a cancellation context.
///
/// The context is owned by whoever delivered the message (usually the dispatch loop).
/// Cancelling it aborts a pending requeue delay. Clones share the same context.
#[derive(Debug, Clone)]
pub struct Message {
    pub uuid: String,
    pub payload: Vec<u8>,
    pub metadata: Metadata,
    context: CancellationToken,
}

impl Message {
    /// Creates a message with a freshly generated UUID.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self::with_uuid(Uuid::new_v4().to_string(), payload)
    }

    pub fn with_uuid(uuid: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            uuid: uuid.into(),
            payload: payload.into(),
            metadata: Metadata::new(),
            context: CancellationToken::new(),
        }
    }

    /// Replaces the metadata, consuming and returning the message.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Replaces the cancellation context, consuming and returning the message.
    pub fn with_context(mut self, context: CancellationToken) -> Self {
        self.context = context;
        self
    }

    pub fn set_context(&mut self, context: CancellationToken) {
        self.context = context;
    }

    pub fn context(&self) -> &CancellationToken {
        &self.context
    }
}
