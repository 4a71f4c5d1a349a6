//! Durable storage of accounts and API keys.
//!
//! [`CredentialStore`] is the seam to the relational store. Lookups of active
//! keys join to the owning account so a deactivated owner never authenticates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use logflow_core::TenantId;
use parking_lot::RwLock;

use crate::account::Account;
use crate::apikey::{ApiKeyHash, ApiKeyId, ApiKeyRecord};
use crate::error::{AuthError, Result};

/// An active key joined with its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveKey {
    /// Key id.
    pub key_id: ApiKeyId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owner's username.
    pub username: String,
}

/// Persistent account and key storage.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Inserts a new account.
    ///
    /// Fails with [`AuthError::Conflict`] if the username or email is taken.
    async fn create_account(&self, account: Account) -> Result<Account>;

    /// Finds an account by username.
    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>>;

    /// Finds an account by tenant id.
    async fn find_account(&self, tenant_id: TenantId) -> Result<Option<Account>>;

    /// Stores a new key and assigns its id.
    async fn create_key(
        &self,
        tenant_id: TenantId,
        name: &str,
        key_hash: ApiKeyHash,
        preview: &str,
    ) -> Result<ApiKeyRecord>;

    /// Lists a tenant's keys, newest first.
    async fn list_keys(&self, tenant_id: TenantId) -> Result<Vec<ApiKeyRecord>>;

    /// Deactivates a tenant's key, returning its hash, or `None` if the key
    /// does not exist or belongs to another tenant.
    async fn deactivate_key(&self, tenant_id: TenantId, key_id: ApiKeyId) -> Result<Option<ApiKeyHash>>;

    /// Finds an active key whose owner is active.
    async fn find_active_key(&self, key_hash: &ApiKeyHash) -> Result<Option<ActiveKey>>;

    /// Records a key's last use.
    async fn touch_key(&self, key_id: ApiKeyId, at: DateTime<Utc>) -> Result<()>;
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<TenantId, Account>,
    keys: Vec<ApiKeyRecord>,
}

/// In-memory credential store.
pub struct MemoryCredentialStore {
    tables: RwLock<Tables>,
    next_key_id: AtomicU64,
    key_lookups: AtomicU64,
    available: AtomicBool,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_key_id: AtomicU64::new(1),
            key_lookups: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates an outage when `false`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of [`CredentialStore::find_active_key`] calls served.
    #[must_use]
    pub fn key_lookups(&self) -> u64 {
        self.key_lookups.load(Ordering::SeqCst)
    }

    /// Marks an account inactive.
    pub fn deactivate_account(&self, tenant_id: TenantId) -> bool {
        let mut tables = self.tables.write();
        tables.accounts.get_mut(&tenant_id).is_some_and(|account| {
            account.is_active = false;
            account.updated_at = Utc::now();
            true
        })
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AuthError::StoreUnavailable("credential store is not reachable".to_string()))
        }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create_account(&self, account: Account) -> Result<Account> {
        self.check_available()?;
        let mut tables = self.tables.write();
        if tables.accounts.values().any(|a| a.username == account.username) {
            return Err(AuthError::Conflict { field: "username" });
        }
        if tables.accounts.values().any(|a| a.email == account.email) {
            return Err(AuthError::Conflict { field: "email" });
        }
        tables.accounts.insert(account.tenant_id, account.clone());
        Ok(account)
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        self.check_available()?;
        let tables = self.tables.read();
        Ok(tables.accounts.values().find(|a| a.username == username).cloned())
    }

    async fn find_account(&self, tenant_id: TenantId) -> Result<Option<Account>> {
        self.check_available()?;
        Ok(self.tables.read().accounts.get(&tenant_id).cloned())
    }

    async fn create_key(
        &self,
        tenant_id: TenantId,
        name: &str,
        key_hash: ApiKeyHash,
        preview: &str,
    ) -> Result<ApiKeyRecord> {
        self.check_available()?;
        let record = ApiKeyRecord {
            id: ApiKeyId(self.next_key_id.fetch_add(1, Ordering::SeqCst)),
            tenant_id,
            name: name.to_string(),
            key_hash,
            preview: preview.to_string(),
            created_at: Utc::now(),
            last_used_at: None,
            is_active: true,
        };
        self.tables.write().keys.push(record.clone());
        Ok(record)
    }

    async fn list_keys(&self, tenant_id: TenantId) -> Result<Vec<ApiKeyRecord>> {
        self.check_available()?;
        let tables = self.tables.read();
        let mut keys: Vec<ApiKeyRecord> = tables
            .keys
            .iter()
            .filter(|k| k.tenant_id == tenant_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(keys)
    }

    async fn deactivate_key(&self, tenant_id: TenantId, key_id: ApiKeyId) -> Result<Option<ApiKeyHash>> {
        self.check_available()?;
        let mut tables = self.tables.write();
        Ok(tables
            .keys
            .iter_mut()
            .find(|k| k.id == key_id && k.tenant_id == tenant_id)
            .map(|k| {
                k.is_active = false;
                k.key_hash
            }))
    }

    async fn find_active_key(&self, key_hash: &ApiKeyHash) -> Result<Option<ActiveKey>> {
        self.check_available()?;
        self.key_lookups.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.read();
        let Some(key) = tables.keys.iter().find(|k| k.is_active && k.key_hash == *key_hash) else {
            return Ok(None);
        };
        Ok(tables
            .accounts
            .get(&key.tenant_id)
            .filter(|owner| owner.is_active)
            .map(|owner| ActiveKey {
                key_id: key.id,
                tenant_id: owner.tenant_id,
                username: owner.username.clone(),
            }))
    }

    async fn touch_key(&self, key_id: ApiKeyId, at: DateTime<Utc>) -> Result<()> {
        self.check_available()?;
        if let Some(key) = self.tables.write().keys.iter_mut().find(|k| k.id == key_id) {
            key.last_used_at = Some(at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apikey::ApiKeySecret;

    fn make_test_account(username: &str) -> Account {
        let now = Utc::now();
        Account {
            tenant_id: TenantId::new(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
            is_active: true,
        }
    }

    async fn make_test_key(store: &MemoryCredentialStore, tenant: TenantId) -> (ApiKeySecret, ApiKeyRecord) {
        let secret = ApiKeySecret::generate();
        let record = store
            .create_key(tenant, "ci", secret.hash(), &secret.masked())
            .await
            .unwrap();
        (secret, record)
    }

    #[tokio::test]
    async fn duplicate_username_and_email_conflict() {
        let store = MemoryCredentialStore::new();
        store.create_account(make_test_account("alice")).await.unwrap();

        let same_name = Account {
            email: "other@example.com".to_string(),
            ..make_test_account("alice")
        };
        assert!(matches!(
            store.create_account(same_name).await,
            Err(AuthError::Conflict { field: "username" })
        ));

        let same_email = Account {
            email: "alice@example.com".to_string(),
            ..make_test_account("bob")
        };
        assert!(matches!(
            store.create_account(same_email).await,
            Err(AuthError::Conflict { field: "email" })
        ));
    }

    #[tokio::test]
    async fn find_account_by_username() {
        let store = MemoryCredentialStore::new();
        let account = store.create_account(make_test_account("alice")).await.unwrap();
        let found = store.find_account_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.tenant_id, account.tenant_id);
        assert!(store.find_account_by_username("nobody").await.unwrap().is_none());
        assert!(store.find_account(account.tenant_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn active_key_lookup_joins_owner() {
        let store = MemoryCredentialStore::new();
        let account = store.create_account(make_test_account("alice")).await.unwrap();
        let (secret, record) = make_test_key(&store, account.tenant_id).await;

        let active = store.find_active_key(&secret.hash()).await.unwrap().unwrap();
        assert_eq!(active.key_id, record.id);
        assert_eq!(active.tenant_id, account.tenant_id);
        assert_eq!(active.username, "alice");
        assert_eq!(store.key_lookups(), 1);

        store.deactivate_account(account.tenant_id);
        assert!(store.find_active_key(&secret.hash()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deactivate_key_is_tenant_scoped() {
        let store = MemoryCredentialStore::new();
        let alice = store.create_account(make_test_account("alice")).await.unwrap();
        let bob = store.create_account(make_test_account("bob")).await.unwrap();
        let (secret, record) = make_test_key(&store, alice.tenant_id).await;

        assert!(store.deactivate_key(bob.tenant_id, record.id).await.unwrap().is_none());
        assert!(store.find_active_key(&secret.hash()).await.unwrap().is_some());

        let hash = store.deactivate_key(alice.tenant_id, record.id).await.unwrap().unwrap();
        assert_eq!(hash, secret.hash());
        assert!(store.find_active_key(&secret.hash()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_keys_newest_first() {
        let store = MemoryCredentialStore::new();
        let alice = store.create_account(make_test_account("alice")).await.unwrap();
        let (_, first) = make_test_key(&store, alice.tenant_id).await;
        let (_, second) = make_test_key(&store, alice.tenant_id).await;
        make_test_key(&store, TenantId::new()).await;

        let keys = store.list_keys(alice.tenant_id).await.unwrap();
        assert_eq!(keys.iter().map(|k| k.id).collect::<Vec<_>>(), vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn touch_updates_last_used() {
        let store = MemoryCredentialStore::new();
        let alice = store.create_account(make_test_account("alice")).await.unwrap();
        let (_, record) = make_test_key(&store, alice.tenant_id).await;
        let at = Utc::now();
        store.touch_key(record.id, at).await.unwrap();
        let keys = store.list_keys(alice.tenant_id).await.unwrap();
        assert_eq!(keys[0].last_used_at, Some(at));
    }

    #[tokio::test]
    async fn unavailable_store_fails_transiently() {
        let store = MemoryCredentialStore::new();
        store.set_available(false);
        let err = store.find_account_by_username("alice").await.unwrap_err();
        assert!(err.is_transient());
    }
}
