//! Core types for stored log records.
//!
//! This module provides:
//! - [`TenantId`]: Owner of a log record
//! - [`LogId`]: Storage-assigned record identifier
//! - [`LogLevel`]: The five accepted severities
//! - [`LogRecord`]: A canonicalized log record
//! - [`LogRecordBuilder`]: Builder for records

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LogError, Result};

/// Identifier of the tenant that owns a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Create a new random `TenantId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TenantId` from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a `TenantId` from a string.
    ///
    /// Returns `None` if the string is not a valid UUID.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage-assigned identifier of a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub u64);

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Log severity levels, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Debugging information
    Debug,
    /// General information
    Info,
    /// Warning conditions
    Warn,
    /// Error conditions
    Error,
    /// Unrecoverable failures
    Fatal,
}

impl LogLevel {
    /// All accepted levels in severity order.
    pub const ALL: [Self; 5] = [Self::Debug, Self::Info, Self::Warn, Self::Error, Self::Fatal];

    /// Returns the canonical (uppercase) name of this level.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    /// Parses a level case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidLevel`] if the value is not one of the five levels.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            "FATAL" => Ok(Self::Fatal),
            _ => Err(LogError::InvalidLevel(value.to_string())),
        }
    }
}

impl FromStr for LogLevel {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonicalized log record.
///
/// Records are created by the ingestion gateway and finalized by storage,
/// which assigns [`LogRecord::id`]. They are never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Storage-assigned id, absent until persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LogId>,
    /// Owner of the record, taken from the authenticated identity
    pub tenant_id: TenantId,
    /// When the event happened
    pub timestamp: DateTime<Utc>,
    /// Emitting host, application or component
    pub source: String,
    /// Severity level
    pub level: LogLevel,
    /// The log message
    pub message: String,
    /// Logical service name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Additional structured metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    /// Unparsed original line, reserved for parsers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_message: Option<String>,
    /// When the record entered the system
    pub created_at: DateTime<Utc>,
}

impl LogRecord {
    /// Creates a new record builder.
    #[must_use]
    pub fn builder() -> LogRecordBuilder {
        LogRecordBuilder::default()
    }

    /// Returns a copy of this record carrying the given storage id.
    #[must_use]
    pub fn with_id(mut self, id: LogId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Builder for constructing log records.
#[derive(Debug, Default)]
pub struct LogRecordBuilder {
    tenant_id: Option<TenantId>,
    timestamp: Option<DateTime<Utc>>,
    source: Option<String>,
    level: Option<LogLevel>,
    message: Option<String>,
    service: Option<String>,
    fields: BTreeMap<String, String>,
    created_at: Option<DateTime<Utc>>,
}

impl LogRecordBuilder {
    /// Sets the owning tenant.
    #[must_use]
    pub const fn tenant_id(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Sets the event timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the source.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the level.
    #[must_use]
    pub const fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the service.
    #[must_use]
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Adds a structured field.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Sets the ingestion timestamp.
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Builds the record.
    ///
    /// `timestamp` and `created_at` default to the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant, source, level or message is missing.
    pub fn build(self) -> Result<LogRecord> {
        let now = Utc::now();
        Ok(LogRecord {
            id: None,
            tenant_id: self.tenant_id.ok_or(LogError::MissingField("tenant_id"))?,
            timestamp: self.timestamp.unwrap_or(now),
            source: self.source.ok_or(LogError::MissingField("source"))?,
            level: self.level.ok_or(LogError::MissingField("level"))?,
            message: self.message.ok_or(LogError::MissingField("message"))?,
            service: self.service,
            fields: self.fields,
            raw_message: None,
            created_at: self.created_at.unwrap_or(now),
        })
    }
}
