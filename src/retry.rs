//! Retry counter carried in message metadata.
//!
//! The counter is stored as a base-10 string under [`RETRIES_KEY`] so any transport
//! can carry it. Downstream consumers reading it should treat a missing or
//! unparseable value as zero, the same way [`get_retry_count`] does.

use crate::message::Message;

/// Metadata key holding the number of times a message has been requeued.
pub const RETRIES_KEY: &str = "requeue_retries";

/// Returns the current retry count. Missing, empty, negative or non-numeric values count as `0`.
pub fn get_retry_count(msg: &Message) -> u64 {
    msg.metadata
        .get(RETRIES_KEY)
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0)
}

/// Writes `count` under [`RETRIES_KEY`], overwriting any previous value.
pub fn set_retry_count(msg: &mut Message, count: u64) {
    msg.metadata.set(RETRIES_KEY, count.to_string());
}

/// Increments the retry count in place and returns the new value.
pub fn increment_retry_count(msg: &mut Message) -> u64 {
    let retries = get_retry_count(msg).saturating_add(1);
    set_retry_count(msg, retries);
    retries
}
