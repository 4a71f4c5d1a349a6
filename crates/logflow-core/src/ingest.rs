//! Submitted log payloads and their canonicalization.
//!
//! Clients never supply the tenant or the ingestion time. Both are stamped
//! here from the authenticated identity and the gateway clock.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};
use crate::types::{LogLevel, LogRecord, TenantId};

/// Maximum number of records accepted in one batch.
pub const MAX_BATCH_SIZE: usize = 1000;

/// A single log record as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Event time; defaults to the ingestion time when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Emitting host or component.
    #[serde(default)]
    pub source: String,
    /// Severity, case-insensitive.
    #[serde(default)]
    pub level: String,
    /// Message text.
    #[serde(default)]
    pub message: String,
    /// Optional logical service name.
    #[serde(default)]
    pub service: Option<String>,
    /// Optional structured metadata.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl IngestRequest {
    /// Creates a request with the three required fields.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        level: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            level: level.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    /// Sets the service name.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Sets the event timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Adds a structured field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Checks required fields and normalizes the level.
    ///
    /// Whitespace-only values count as missing.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::MissingField`] or [`LogError::InvalidLevel`].
    pub fn validate(&self) -> Result<LogLevel> {
        if self.source.trim().is_empty() {
            return Err(LogError::MissingField("source"));
        }
        if self.level.trim().is_empty() {
            return Err(LogError::MissingField("level"));
        }
        if self.message.trim().is_empty() {
            return Err(LogError::MissingField("message"));
        }
        LogLevel::parse(&self.level)
    }

    /// Validates and converts the request into a record owned by `tenant_id`.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`IngestRequest::validate`].
    pub fn into_record(self, tenant_id: TenantId, now: DateTime<Utc>) -> Result<LogRecord> {
        let level = self.validate()?;
        Ok(LogRecord {
            id: None,
            tenant_id,
            timestamp: self.timestamp.unwrap_or(now),
            source: self.source,
            level,
            message: self.message,
            service: self.service.filter(|s| !s.trim().is_empty()),
            fields: self.fields,
            raw_message: None,
            created_at: now,
        })
    }
}

/// A batch of submitted log records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchIngestRequest {
    /// The submitted records.
    #[serde(default)]
    pub logs: Vec<IngestRequest>,
}

/// Validates and canonicalizes a whole batch.
///
/// Validation is all-or-nothing: if any item fails, no records are returned
/// and the error lists every failing item as `item N: reason` with a
/// zero-based index.
///
/// # Errors
///
/// Returns [`LogError::EmptyBatch`], [`LogError::BatchTooLarge`] or
/// [`LogError::InvalidItems`].
pub fn canonicalize_batch(
    logs: Vec<IngestRequest>,
    tenant_id: TenantId,
    now: DateTime<Utc>,
) -> Result<Vec<LogRecord>> {
    if logs.is_empty() {
        return Err(LogError::EmptyBatch);
    }
    if logs.len() > MAX_BATCH_SIZE {
        return Err(LogError::BatchTooLarge {
            size: logs.len(),
            max: MAX_BATCH_SIZE,
        });
    }

    let errors: Vec<String> = logs
        .iter()
        .enumerate()
        .filter_map(|(i, req)| req.validate().err().map(|e| format!("item {i}: {e}")))
        .collect();
    if !errors.is_empty() {
        return Err(LogError::InvalidItems(errors));
    }

    logs.into_iter()
        .map(|req| req.into_record(tenant_id, now))
        .collect()
}
