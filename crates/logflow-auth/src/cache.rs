//! Cache of validated API keys, keyed by the key's hash.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use logflow_core::TenantId;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::apikey::ApiKeyId;
use crate::error::{AuthError, Result};

/// What the cache remembers about a validated key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedKey {
    /// Key id, used for best-effort last-use tracking.
    pub key_id: ApiKeyId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owner's username.
    pub username: String,
}

/// A shared key-value cache with per-entry expiry.
#[async_trait]
pub trait KeyCache: Send + Sync {
    /// Looks up an entry; expired entries are misses.
    async fn get(&self, key: &str) -> Result<Option<CachedKey>>;

    /// Stores an entry for `ttl`.
    async fn put(&self, key: &str, value: CachedKey, ttl: Duration) -> Result<()>;

    /// Removes an entry.
    async fn invalidate(&self, key: &str) -> Result<()>;
}

struct Entry {
    value: CachedKey,
    expires_at: Instant,
}

/// In-memory [`KeyCache`].
pub struct MemoryKeyCache {
    entries: DashMap<String, Entry>,
    available: AtomicBool,
}

impl MemoryKeyCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates an outage when `false`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of entries, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AuthError::Cache("key cache is not reachable".to_string()))
        }
    }
}

impl Default for MemoryKeyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyCache for MemoryKeyCache {
    async fn get(&self, key: &str) -> Result<Option<CachedKey>> {
        self.check_available()?;
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.value.clone()));
        match hit {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: CachedKey, ttl: Duration) -> Result<()> {
        self.check_available()?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_entry() -> CachedKey {
        CachedKey {
            key_id: ApiKeyId(1),
            tenant_id: TenantId::new(),
            username: "alice".to_string(),
        }
    }

    #[tokio::test]
    async fn put_then_get() {
        let cache = MemoryKeyCache::new();
        let entry = make_test_entry();
        cache.put("k", entry.clone(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(entry));
        assert_eq!(cache.get("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = MemoryKeyCache::new();
        cache.put("k", make_test_entry(), Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn invalidate_removes() {
        let cache = MemoryKeyCache::new();
        cache.put("k", make_test_entry(), Duration::from_secs(60)).await.unwrap();
        cache.invalidate("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unavailable_cache_errors() {
        let cache = MemoryKeyCache::new();
        cache.set_available(false);
        assert!(matches!(cache.get("k").await, Err(AuthError::Cache(_))));
    }
}
