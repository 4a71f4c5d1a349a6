//! Traits for log storage backends.

use async_trait::async_trait;
use logflow_core::{LogId, LogRecord, TenantId};
use logflow_query::CompiledQuery;

use crate::error::Result;

/// Persistence backend for log records.
///
/// Every read and delete takes a [`CompiledQuery`], which is always scoped
/// to one tenant.
#[async_trait]
pub trait LogStorage: Send + Sync {
    /// Persists one record and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects or cannot store the record.
    async fn insert(&self, record: LogRecord) -> Result<LogId>;

    /// Persists a batch atomically: either every record is stored or none is.
    ///
    /// Ids are returned in input order.
    async fn insert_batch(&self, records: Vec<LogRecord>) -> Result<Vec<LogId>>;

    /// Returns one sorted page of matching records.
    async fn query(&self, query: &CompiledQuery) -> Result<Vec<LogRecord>>;

    /// Counts all matching records, ignoring pagination.
    async fn count(&self, query: &CompiledQuery) -> Result<u64>;

    /// Deletes all matching records and returns how many were removed.
    async fn delete(&self, query: &CompiledQuery) -> Result<u64>;

    /// Returns the tenant's newest records by timestamp.
    async fn recent(&self, tenant_id: TenantId, limit: usize) -> Result<Vec<LogRecord>>;
}
