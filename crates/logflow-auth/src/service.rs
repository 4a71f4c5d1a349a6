//! Account registration, login and API key management.

use std::sync::Arc;

use chrono::Utc;
use logflow_core::TenantId;
use serde::Serialize;
use tracing::info;

use crate::account::{hash_password, verify_password, Account, LoginRequest, RegisterRequest};
use crate::apikey::{validate_key_name, ApiKeyId, ApiKeySecret, ApiKeyView};
use crate::error::{AuthError, Result};
use crate::store::CredentialStore;
use crate::token::TokenService;
use crate::validator::CredentialValidator;

/// A signed-in account and its session token.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// The account.
    pub user: Account,
    /// Session token.
    pub token: String,
}

/// A freshly created key; the only time the full secret is returned.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedKey {
    /// Key id.
    pub id: ApiKeyId,
    /// Full plaintext key.
    pub api_key: String,
    /// Name.
    pub name: String,
    /// Creation time.
    pub created_at: chrono::DateTime<Utc>,
    /// Always true for a new key.
    pub is_active: bool,
}

/// Account and key workflows on top of a [`CredentialStore`].
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    validator: Arc<CredentialValidator>,
}

impl AccountService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<TokenService>,
        validator: Arc<CredentialValidator>,
    ) -> Self {
        Self {
            store,
            tokens,
            validator,
        }
    }

    /// Registers an account and signs it in.
    ///
    /// # Errors
    ///
    /// Returns a validation error, a conflict on duplicate username or
    /// email, or a transient store error.
    pub async fn register(&self, request: RegisterRequest) -> Result<Session> {
        request.validate()?;
        let now = Utc::now();
        let account = Account {
            tenant_id: TenantId::new(),
            username: request.username,
            email: request.email,
            password_hash: hash_password(&request.password)?,
            created_at: now,
            updated_at: now,
            is_active: true,
        };
        let account = self.store.create_account(account).await?;
        info!(tenant_id = %account.tenant_id, username = %account.username, "account registered");
        let token = self.tokens.issue(account.tenant_id, &account.username)?;
        Ok(Session { user: account, token })
    }

    /// Checks a username and password and issues a token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown user, wrong
    /// password or inactive account.
    pub async fn login(&self, request: LoginRequest) -> Result<Session> {
        if request.username.is_empty() || request.password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let account = self
            .store
            .find_account_by_username(&request.username)
            .await?
            .filter(|a| a.is_active)
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(&request.password, &account.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        let token = self.tokens.issue(account.tenant_id, &account.username)?;
        Ok(Session { user: account, token })
    }

    /// Creates a named key for a tenant.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad name or a transient store error.
    pub async fn create_key(&self, tenant_id: TenantId, name: &str) -> Result<CreatedKey> {
        validate_key_name(name)?;
        let secret = ApiKeySecret::generate();
        let record = self
            .store
            .create_key(tenant_id, name.trim(), secret.hash(), &secret.masked())
            .await?;
        info!(tenant_id = %tenant_id, key_id = %record.id, "api key created");
        Ok(CreatedKey {
            id: record.id,
            api_key: secret.as_str().to_string(),
            name: record.name,
            created_at: record.created_at,
            is_active: record.is_active,
        })
    }

    /// Lists a tenant's keys with masked secrets.
    ///
    /// # Errors
    ///
    /// Returns a transient store error.
    pub async fn list_keys(&self, tenant_id: TenantId) -> Result<Vec<ApiKeyView>> {
        let keys = self.store.list_keys(tenant_id).await?;
        Ok(keys.iter().map(ApiKeyView::from).collect())
    }

    /// Deactivates a key and invalidates its cached mapping.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyNotFound`] if the tenant owns no such key.
    pub async fn delete_key(&self, tenant_id: TenantId, key_id: ApiKeyId) -> Result<()> {
        self.validator.revoke_key(tenant_id, key_id).await?;
        info!(tenant_id = %tenant_id, key_id = %key_id, "api key deactivated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{KeyCache, MemoryKeyCache};
    use crate::store::MemoryCredentialStore;
    use crate::token::{TokenConfig, DEFAULT_ISSUER};
    use crate::validator::{AcceptedSchemes, AuthOutcome, ValidatorConfig};

    fn make_test_service() -> (AccountService, Arc<CredentialValidator>) {
        let tokens = Arc::new(TokenService::new(TokenConfig::new([5u8; 32], DEFAULT_ISSUER).unwrap()));
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
        let cache: Arc<dyn KeyCache> = Arc::new(MemoryKeyCache::new());
        let validator = Arc::new(CredentialValidator::new(
            Arc::clone(&tokens),
            Arc::clone(&store),
            cache,
            ValidatorConfig::default(),
        ));
        (AccountService::new(store, tokens, Arc::clone(&validator)), validator)
    }

    fn make_test_register(username: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: "password123".to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let (service, validator) = make_test_service();
        let session = service.register(make_test_register("alice")).await.unwrap();
        assert_eq!(session.user.username, "alice");

        let login = service
            .login(LoginRequest {
                username: "alice".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(login.user.tenant_id, session.user.tenant_id);

        let identity = validator
            .validate(&login.token, AcceptedSchemes::TokenOnly)
            .await
            .unwrap()
            .identity()
            .unwrap();
        assert_eq!(identity.tenant_id, session.user.tenant_id);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let (service, _) = make_test_service();
        service.register(make_test_register("alice")).await.unwrap();
        let err = service.register(make_test_register("alice")).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict { field: "username" }));
    }

    #[tokio::test]
    async fn bad_login_is_generic() {
        let (service, _) = make_test_service();
        service.register(make_test_register("alice")).await.unwrap();

        let wrong_password = service
            .login(LoginRequest {
                username: "alice".to_string(),
                password: "nope-nope".to_string(),
            })
            .await
            .unwrap_err();
        let unknown_user = service
            .login(LoginRequest {
                username: "mallory".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_user, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn key_lifecycle() {
        let (service, validator) = make_test_service();
        let tenant = service.register(make_test_register("alice")).await.unwrap().user.tenant_id;

        let created = service.create_key(tenant, "ingest").await.unwrap();
        assert!(ApiKeySecret::is_well_formed(&created.api_key));

        let listed = service.list_keys(tenant).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_ne!(listed[0].api_key, created.api_key);
        assert!(listed[0].api_key.contains("..."));

        service.delete_key(tenant, created.id).await.unwrap();
        let outcome = validator
            .validate(&created.api_key, AcceptedSchemes::KeyOnly)
            .await
            .unwrap();
        assert_eq!(outcome, AuthOutcome::Rejected);
        assert!(!service.list_keys(tenant).await.unwrap()[0].is_active);
    }

    #[tokio::test]
    async fn create_key_validates_name() {
        let (service, _) = make_test_service();
        let err = service.create_key(TenantId::new(), "  ").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }
}
