//! Ingestion gateway.
//!
//! Validates and canonicalizes submitted records for an authenticated tenant
//! and hands them to the durable queue, or straight to storage in
//! [`IngestMode::Direct`]. The gateway never retries a failed publish.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use logflow_core::{IngestRequest, LogError, LogId, LogRecord, TenantId, canonicalize_batch};
use logflow_queue::{DurableQueue, Envelope, MessageId, QueueError};
use logflow_store::{LogStorage, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::IngestMode;
use crate::error::ApiError;

/// Errors raised while accepting records.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A record failed validation.
    #[error(transparent)]
    Invalid(#[from] LogError),

    /// Publishing to the queue failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Writing to storage failed.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Invalid(e) => e.into(),
            GatewayError::Queue(e) => e.into(),
            GatewayError::Storage(e) => e.into(),
        }
    }
}

/// What happened to accepted records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestReceipt {
    /// Appended to the queue; visible once a consumer persists them.
    Queued {
        /// Assigned queue message ids, in submission order.
        message_ids: Vec<MessageId>,
        /// When the records were accepted.
        timestamp: DateTime<Utc>,
        /// Human-readable summary.
        message: String,
    },
    /// Persisted within the request.
    Stored {
        /// Assigned log ids, in submission order.
        ids: Vec<LogId>,
        /// When the records were accepted.
        timestamp: DateTime<Utc>,
    },
}

impl IngestReceipt {
    /// Number of records covered by the receipt.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Queued { message_ids, .. } => message_ids.len(),
            Self::Stored { ids, .. } => ids.len(),
        }
    }

    /// Whether the receipt covers no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Accepts records for the write path.
pub struct IngestionGateway {
    mode: IngestMode,
    topic: String,
    queue: Arc<dyn DurableQueue>,
    storage: Arc<dyn LogStorage>,
}

impl IngestionGateway {
    /// Creates a gateway publishing to `topic`.
    #[must_use]
    pub fn new(
        mode: IngestMode,
        topic: impl Into<String>,
        queue: Arc<dyn DurableQueue>,
        storage: Arc<dyn LogStorage>,
    ) -> Self {
        Self {
            mode,
            topic: topic.into(),
            queue,
            storage,
        }
    }

    /// The configured ingest mode.
    #[must_use]
    pub const fn mode(&self) -> IngestMode {
        self.mode
    }

    /// Validates and accepts a single record.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Invalid`] for a bad record, or a queue or
    /// storage error if the record could not be handed off.
    pub async fn ingest(&self, tenant_id: TenantId, request: IngestRequest) -> Result<IngestReceipt, GatewayError> {
        let now = Utc::now();
        let record = request.into_record(tenant_id, now)?;
        self.accept(tenant_id, vec![record], now).await
    }

    /// Validates and accepts a batch, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Invalid`] listing every failing item if any
    /// item is invalid; nothing is published in that case.
    pub async fn ingest_batch(
        &self,
        tenant_id: TenantId,
        requests: Vec<IngestRequest>,
    ) -> Result<IngestReceipt, GatewayError> {
        let now = Utc::now();
        let records = canonicalize_batch(requests, tenant_id, now)?;
        self.accept(tenant_id, records, now).await
    }

    async fn accept(
        &self,
        tenant_id: TenantId,
        mut records: Vec<LogRecord>,
        now: DateTime<Utc>,
    ) -> Result<IngestReceipt, GatewayError> {
        let count = records.len();
        let receipt = match self.mode {
            IngestMode::Queued => {
                let message_ids = if let [record] = records.as_slice() {
                    vec![self.queue.append(&self.topic, Envelope::encode(record)?).await?]
                } else {
                    let envelopes = records
                        .iter()
                        .map(Envelope::encode)
                        .collect::<Result<Vec<_>, _>>()?;
                    self.queue.append_batch(&self.topic, envelopes).await?
                };
                debug!(tenant_id = %tenant_id, count, topic = %self.topic, "records queued");
                IngestReceipt::Queued {
                    message_ids,
                    timestamp: now,
                    message: format!("{count} log(s) queued for processing"),
                }
            }
            IngestMode::Direct => {
                let ids = if count == 1 {
                    vec![self.storage.insert(records.remove(0)).await?]
                } else {
                    self.storage.insert_batch(records).await?
                };
                debug!(tenant_id = %tenant_id, count, "records stored");
                IngestReceipt::Stored { ids, timestamp: now }
            }
        };
        if count > 1 {
            info!(tenant_id = %tenant_id, count, "batch accepted");
        }
        Ok(receipt)
    }
}
