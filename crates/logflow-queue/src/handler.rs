//! Record handler that persists into a [`LogStorage`] backend.

use std::sync::Arc;

use async_trait::async_trait;
use logflow_core::LogRecord;
use logflow_store::LogStorage;
use tracing::debug;

use crate::error::Result;
use crate::traits::RecordHandler;

/// Writes each record to storage, one insert per message.
pub struct StorageHandler {
    storage: Arc<dyn LogStorage>,
}

impl StorageHandler {
    /// Creates a handler over `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn LogStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RecordHandler for StorageHandler {
    async fn handle(&self, record: LogRecord) -> Result<()> {
        let tenant_id = record.tenant_id;
        let level = record.level;
        let id = self.storage.insert(record).await?;
        debug!(log_id = %id, tenant_id = %tenant_id, level = %level, "log persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueueError;
    use logflow_core::{LogLevel, TenantId};
    use logflow_store::MemoryLogStorage;

    fn make_test_record() -> LogRecord {
        LogRecord::builder()
            .tenant_id(TenantId::new())
            .source("api")
            .level(LogLevel::Debug)
            .message("cache miss")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn persists_record() {
        let storage = Arc::new(MemoryLogStorage::new());
        let handler = StorageHandler::new(storage.clone());
        handler.handle(make_test_record()).await.unwrap();
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn surfaces_storage_failure() {
        let storage = Arc::new(MemoryLogStorage::new());
        storage.set_available(false);
        let handler = StorageHandler::new(storage.clone());
        let err = handler.handle(make_test_record()).await.unwrap_err();
        assert!(matches!(err, QueueError::Storage(ref e) if e.is_transient()));
    }
}
