//! Queue message types.
//!
//! This module provides:
//! - [`MessageId`]: Stream-ordered message identifier (`<millis>-<seq>`)
//! - [`Envelope`]: Field map carried by every queue entry
//! - [`QueueMessage`]: A delivered entry with its delivery count
//! - [`StreamInfo`] / [`GroupInfo`]: Topic introspection

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use logflow_core::LogRecord;
use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};

/// Topic that ingested records are appended to.
pub const DEFAULT_TOPIC: &str = "logs:incoming";

/// Consumer group shared by all processors.
pub const DEFAULT_GROUP: &str = "log-processors";

/// Envelope field holding the JSON-encoded record.
pub const LOG_FIELD: &str = "log";

/// Envelope field added when a message is dead-lettered.
pub const ERROR_FIELD: &str = "error";

/// Envelope field naming the original message of a dead-lettered entry.
pub const ORIGIN_FIELD: &str = "origin_id";

/// Identifier assigned by the queue on append.
///
/// Ordered by append time, then by sequence within the same millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId {
    /// Append time in milliseconds since the Unix epoch
    pub millis: u64,
    /// Sequence within the millisecond
    pub seq: u64,
}

impl MessageId {
    /// Creates a message id.
    #[must_use]
    pub const fn new(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for MessageId {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || QueueError::Poison(format!("invalid message id: {s}"));
        let (millis, seq) = s.split_once('-').ok_or_else(invalid)?;
        Ok(Self {
            millis: millis.parse().map_err(|_| invalid())?,
            seq: seq.parse().map_err(|_| invalid())?,
        })
    }
}

impl Serialize for MessageId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Field map stored in a queue entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    fields: BTreeMap<String, String>,
}

impl Envelope {
    /// Creates an empty envelope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes a record into the `log` field.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized.
    pub fn encode(record: &LogRecord) -> Result<Self> {
        let json = serde_json::to_string(record)?;
        Ok(Self::new().with_field(LOG_FIELD, json))
    }

    /// Adds or replaces a field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// All fields.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Decodes the `log` field back into a record.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Poison`] if the field is missing or not a valid record.
    pub fn decode(&self) -> Result<LogRecord> {
        let json = self
            .get(LOG_FIELD)
            .ok_or_else(|| QueueError::Poison("missing log field".to_string()))?;
        serde_json::from_str(json).map_err(|e| QueueError::Poison(format!("invalid log json: {e}")))
    }

    /// Copy of this envelope annotated for a dead-letter topic.
    #[must_use]
    pub fn dead_letter(&self, origin: MessageId, reason: &str) -> Self {
        self.clone()
            .with_field(ORIGIN_FIELD, origin.to_string())
            .with_field(ERROR_FIELD, reason)
    }
}

/// An entry handed to a consumer by `read_group`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Entry id
    pub id: MessageId,
    /// Entry payload
    pub envelope: Envelope,
    /// Number of times this entry has been delivered, starting at 1
    pub delivery_count: u32,
}

/// State of one consumer group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Group name
    pub name: String,
    /// Delivered but unacknowledged entries
    pub pending: usize,
    /// Consumers that have read from the group
    pub consumers: usize,
    /// Last entry handed out to the group
    pub last_delivered: Option<MessageId>,
}

/// State of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Topic name
    pub topic: String,
    /// Entries currently held
    pub length: usize,
    /// Consumer groups
    pub groups: Vec<GroupInfo>,
}
