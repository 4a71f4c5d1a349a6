//! # logflow-core
//!
//! Log record model shared by every logflow crate.
//!
//! This crate provides:
//!
//! - [`LogRecord`]: A canonicalized, tenant-owned log record
//! - [`LogLevel`]: Severity levels (Debug, Info, Warn, Error, Fatal)
//! - [`TenantId`] / [`LogId`]: Identifiers
//! - [`IngestRequest`] / [`BatchIngestRequest`]: Client payloads
//! - [`canonicalize_batch`]: All-or-nothing batch validation
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use logflow_core::{IngestRequest, LogLevel, TenantId};
//!
//! let record = IngestRequest::new("api-gateway", "error", "upstream timed out")
//!     .into_record(TenantId::new(), Utc::now())
//!     .unwrap();
//!
//! assert_eq!(record.level, LogLevel::Error);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod ingest;
pub mod types;

pub use error::{LogError, Result};
pub use ingest::{BatchIngestRequest, IngestRequest, MAX_BATCH_SIZE, canonicalize_batch};
pub use types::{LogId, LogLevel, LogRecord, LogRecordBuilder, TenantId};
