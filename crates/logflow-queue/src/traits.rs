//! Traits at the queue seams.

use std::time::Duration;

use async_trait::async_trait;
use logflow_core::LogRecord;

use crate::error::Result;
use crate::types::{Envelope, MessageId, QueueMessage, StreamInfo};

/// Ordered, append-only log with consumer-group delivery.
///
/// Within a group each entry is delivered to one consumer at a time and stays
/// pending until acknowledged. Unacknowledged entries are eventually handed
/// out again, so delivery is at-least-once.
#[async_trait]
pub trait DurableQueue: Send + Sync {
    /// Appends one entry.
    async fn append(&self, topic: &str, envelope: Envelope) -> Result<MessageId>;

    /// Appends several entries; either all are appended or none is.
    async fn append_batch(&self, topic: &str, envelopes: Vec<Envelope>) -> Result<Vec<MessageId>>;

    /// Claims up to `max_batch` entries for `consumer`, waiting at most `wait`
    /// when nothing is available.
    ///
    /// Returns an empty vector when the wait elapses.
    async fn read_group(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        max_batch: usize,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>>;

    /// Removes an entry from the group's pending list.
    ///
    /// Returns `false` if it was not pending.
    async fn ack(&self, topic: &str, group: &str, id: MessageId) -> Result<bool>;

    /// Creates the group (and topic) if absent, starting from the first entry.
    async fn ensure_group(&self, topic: &str, group: &str) -> Result<()>;

    /// Topic length and per-group delivery state.
    async fn stream_info(&self, topic: &str) -> Result<StreamInfo>;
}

/// Persists one decoded record on behalf of a consumer.
#[async_trait]
pub trait RecordHandler: Send + Sync {
    /// Handles a record. An error leaves the message pending for redelivery.
    async fn handle(&self, record: LogRecord) -> Result<()>;
}
