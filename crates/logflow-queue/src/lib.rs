//! # logflow-queue
//!
//! Hand-off between ingestion and persistence.
//!
//! This crate provides:
//!
//! - [`DurableQueue`]: Append-only log with consumer-group delivery
//! - [`MemoryQueue`]: In-process implementation with pending lists and
//!   idle redelivery
//! - [`Envelope`]: Entry payload; the record travels as JSON in the `log` field
//! - [`ProcessingConsumer`]: Group member that persists records and
//!   acknowledges only on success
//! - [`StorageHandler`]: [`RecordHandler`] writing into a
//!   [`logflow_store::LogStorage`]
//!
//! Delivery is at-least-once. A record whose handler fails stays pending and
//! is delivered again; duplicates are not filtered.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consumer;
pub mod error;
pub mod handler;
pub mod memory;
pub mod traits;
pub mod types;

pub use consumer::{ConsumerConfig, ConsumerStats, ProcessingConsumer, StatsSnapshot};
pub use error::{QueueError, Result};
pub use handler::StorageHandler;
pub use memory::{MemoryQueue, MemoryQueueConfig};
pub use traits::{DurableQueue, RecordHandler};
pub use types::{
    DEFAULT_GROUP, DEFAULT_TOPIC, Envelope, GroupInfo, LOG_FIELD, MessageId, QueueMessage,
    StreamInfo,
};
