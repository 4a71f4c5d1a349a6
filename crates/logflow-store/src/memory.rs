//! In-memory log storage.
//!
//! Evaluates compiled predicates directly against stored records. Used by
//! the single-process binary and by tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use logflow_core::{LogId, LogRecord, TenantId};
use logflow_query::CompiledQuery;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::traits::LogStorage;

/// Thread-safe in-memory log storage.
pub struct MemoryLogStorage {
    /// Records keyed by id, in insertion order
    records: RwLock<BTreeMap<LogId, LogRecord>>,
    /// Next id counter
    next_id: AtomicU64,
    /// Whether the store is accepting operations
    available: AtomicBool,
}

impl MemoryLogStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            available: AtomicBool::new(true),
        }
    }

    /// Marks the store available or unavailable.
    ///
    /// While unavailable every operation fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Total records across all tenants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }

    fn assign(&self, record: LogRecord) -> Result<(LogId, LogRecord)> {
        if record.id.is_some() {
            return Err(StoreError::InvalidRecord("record already has an id".to_string()));
        }
        let id = LogId(self.next_id.fetch_add(1, Ordering::Relaxed));
        Ok((id, record.with_id(id)))
    }
}

impl Default for MemoryLogStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogStorage for MemoryLogStorage {
    async fn insert(&self, record: LogRecord) -> Result<LogId> {
        self.check_available()?;
        let (id, record) = self.assign(record)?;
        self.records.write().insert(id, record);
        Ok(id)
    }

    async fn insert_batch(&self, records: Vec<LogRecord>) -> Result<Vec<LogId>> {
        self.check_available()?;
        let assigned = records
            .into_iter()
            .map(|r| self.assign(r))
            .collect::<Result<Vec<_>>>()?;

        let ids: Vec<LogId> = assigned.iter().map(|(id, _)| *id).collect();
        self.records.write().extend(assigned);
        debug!(count = ids.len(), "inserted batch");
        Ok(ids)
    }

    async fn query(&self, query: &CompiledQuery) -> Result<Vec<LogRecord>> {
        self.check_available()?;
        let mut matched: Vec<LogRecord> = self
            .records
            .read()
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();

        let sort = query.sort();
        matched.sort_by(|a, b| sort.compare(a, b));

        let Some(page) = query.pagination() else {
            return Ok(matched);
        };
        Ok(matched
            .into_iter()
            .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit).unwrap_or(0))
            .collect())
    }

    async fn count(&self, query: &CompiledQuery) -> Result<u64> {
        self.check_available()?;
        let count = self.records.read().values().filter(|r| query.matches(r)).count();
        Ok(count as u64)
    }

    async fn delete(&self, query: &CompiledQuery) -> Result<u64> {
        self.check_available()?;
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, r| !query.matches(r));
        let deleted = (before - records.len()) as u64;
        drop(records);

        debug!(tenant_id = %query.tenant_id(), deleted, "bulk delete");
        Ok(deleted)
    }

    async fn recent(&self, tenant_id: TenantId, limit: usize) -> Result<Vec<LogRecord>> {
        self.check_available()?;
        let mut owned: Vec<LogRecord> = self
            .records
            .read()
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        owned.truncate(limit);
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use logflow_core::LogLevel;
    use logflow_query::{QueryFilter, compile, compile_delete};
    use proptest::prelude::*;

    fn make_test_record(tenant: TenantId, source: &str, level: LogLevel, minutes_ago: i64) -> LogRecord {
        LogRecord::builder()
            .tenant_id(tenant)
            .timestamp(Utc::now() - Duration::minutes(minutes_ago))
            .source(source)
            .level(level)
            .message(format!("{source} {level}"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = MemoryLogStorage::new();
        let tenant = TenantId::new();
        let a = store.insert(make_test_record(tenant, "a", LogLevel::Info, 0)).await.unwrap();
        let b = store.insert(make_test_record(tenant, "b", LogLevel::Info, 0)).await.unwrap();
        assert!(b > a);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn insert_batch_is_atomic() {
        let store = MemoryLogStorage::new();
        let tenant = TenantId::new();
        let preassigned = make_test_record(tenant, "x", LogLevel::Info, 0).with_id(LogId(99));
        let batch = vec![make_test_record(tenant, "a", LogLevel::Info, 0), preassigned];

        assert!(store.insert_batch(batch).await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_fails_transiently() {
        let store = MemoryLogStorage::new();
        store.set_available(false);
        let err = store
            .insert(make_test_record(TenantId::new(), "a", LogLevel::Info, 0))
            .await
            .unwrap_err();
        assert!(err.is_transient());

        store.set_available(true);
        assert!(store.insert(make_test_record(TenantId::new(), "a", LogLevel::Info, 0)).await.is_ok());
    }

    #[tokio::test]
    async fn query_sorts_and_paginates() {
        let store = MemoryLogStorage::new();
        let tenant = TenantId::new();
        for i in 0..5 {
            store.insert(make_test_record(tenant, "api", LogLevel::Info, i)).await.unwrap();
        }

        let filter = QueryFilter::new().with_limit(2).with_offset(1);
        let query = compile(&filter, tenant, Utc::now()).unwrap();
        let page = store.query(&query).await.unwrap();

        // Newest first: minutes_ago 1 then 2.
        assert_eq!(page.len(), 2);
        assert!(page[0].timestamp > page[1].timestamp);
        assert_eq!(page[0].id, Some(LogId(2)));
        assert_eq!(store.count(&query).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn delete_is_tenant_scoped() {
        let store = MemoryLogStorage::new();
        let mine = TenantId::new();
        let theirs = TenantId::new();
        store.insert(make_test_record(mine, "api", LogLevel::Error, 0)).await.unwrap();
        store.insert(make_test_record(mine, "api", LogLevel::Info, 0)).await.unwrap();
        store.insert(make_test_record(theirs, "api", LogLevel::Error, 0)).await.unwrap();

        let filter = QueryFilter::new().with_level("error").with_limit(1);
        let query = compile_delete(&filter, mine, Utc::now()).unwrap();
        assert_eq!(store.delete(&query).await.unwrap(), 1);
        assert_eq!(store.len(), 2);

        let theirs_all = compile(&QueryFilter::new(), theirs, Utc::now()).unwrap();
        assert_eq!(store.count(&theirs_all).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn recent_returns_newest_first() {
        let store = MemoryLogStorage::new();
        let tenant = TenantId::new();
        store.insert(make_test_record(tenant, "old", LogLevel::Info, 30)).await.unwrap();
        store.insert(make_test_record(tenant, "new", LogLevel::Info, 1)).await.unwrap();
        store.insert(make_test_record(TenantId::new(), "other", LogLevel::Info, 0)).await.unwrap();

        let recent = store.recent(tenant, 10).await.unwrap();
        let sources: Vec<_> = recent.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["new", "old"]);

        assert_eq!(store.recent(tenant, 1).await.unwrap().len(), 1);
    }

    fn level_strategy() -> impl Strategy<Value = LogLevel> {
        proptest::sample::select(LogLevel::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn every_returned_record_matches_and_is_owned(
            rows in proptest::collection::vec((any::<bool>(), "[ab]", level_strategy()), 1..40),
            level in level_strategy(),
            source in "[ab]",
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryLogStorage::new();
                let mine = TenantId::new();
                let theirs = TenantId::new();
                for (own, src, lvl) in &rows {
                    let tenant = if *own { mine } else { theirs };
                    store.insert(make_test_record(tenant, src, *lvl, 0)).await.unwrap();
                }

                let filter = QueryFilter::new()
                    .with_level(level.as_str().to_lowercase())
                    .with_source(source.clone())
                    .with_limit(1000);
                let query = compile(&filter, mine, Utc::now()).unwrap();
                let results = store.query(&query).await.unwrap();

                let expected = rows
                    .iter()
                    .filter(|(own, src, lvl)| *own && *src == source && *lvl == level)
                    .count();
                assert_eq!(results.len(), expected);
                for record in results {
                    assert_eq!(record.tenant_id, mine);
                    assert_eq!(record.level, level);
                    assert_eq!(record.source, source);
                }
            });
        }
    }
}
