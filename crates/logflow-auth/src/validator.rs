//! Dual-scheme credential validation.
//!
//! A bearer credential is either a signed session token or an opaque API
//! key. Validation runs an ordered chain of checks and returns an
//! [`AuthOutcome`]:
//!
//! 1. [`CredentialValidator::try_stateless_token`]: signature, issuer, expiry
//! 2. [`CredentialValidator::try_opaque_key`]: cache-aside lookup of the key
//!
//! Which links of the chain run depends on the [`AcceptedSchemes`] of the
//! endpoint.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use logflow_core::TenantId;
use serde::Serialize;
use tracing::{debug, warn};

use crate::apikey::{ApiKeyHash, ApiKeyId, ApiKeySecret};
use crate::cache::{CachedKey, KeyCache};
use crate::error::{AuthError, Result};
use crate::store::CredentialStore;
use crate::token::TokenService;

/// Default lifetime of a cached key mapping.
pub const DEFAULT_KEY_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// Validator settings.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// How long a validated key stays cached.
    pub key_cache_ttl: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            key_cache_ttl: DEFAULT_KEY_CACHE_TTL,
        }
    }
}

impl ValidatorConfig {
    /// Sets the key cache TTL.
    #[must_use]
    pub const fn with_key_cache_ttl(mut self, ttl: Duration) -> Self {
        self.key_cache_ttl = ttl;
        self
    }
}

/// Which credential schemes an endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptedSchemes {
    /// Session tokens only; the key path is never consulted.
    TokenOnly,
    /// API keys only; anything not key-shaped is rejected up front.
    KeyOnly,
    /// Token first, then the key path on any token failure.
    Either,
}

/// The scheme that authenticated a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// Signed session token.
    Token,
    /// Opaque API key.
    ApiKey,
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Tenant all reads and writes are scoped to.
    pub tenant_id: TenantId,
    /// Username of the owning account.
    pub display_name: String,
    /// How the caller authenticated.
    pub scheme: Scheme,
}

/// Result of validating a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The credential is valid.
    Authenticated(Identity),
    /// The credential is missing, malformed, unknown, expired or revoked.
    Rejected,
}

impl AuthOutcome {
    /// Returns the identity if authenticated.
    #[must_use]
    pub fn identity(self) -> Option<Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            Self::Rejected => None,
        }
    }
}

/// Validates bearer credentials against tokens and stored keys.
pub struct CredentialValidator {
    tokens: Arc<TokenService>,
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn KeyCache>,
    config: ValidatorConfig,
    /// Revocation count per key hash. A lookup that started before a
    /// revocation must not leave its result cached.
    revocations: DashMap<String, u64>,
}

impl CredentialValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new(
        tokens: Arc<TokenService>,
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn KeyCache>,
        config: ValidatorConfig,
    ) -> Self {
        Self {
            tokens,
            store,
            cache,
            config,
            revocations: DashMap::new(),
        }
    }

    /// Validates a bearer credential for an endpoint.
    ///
    /// # Errors
    ///
    /// Returns a transient error only when the credential store fails; bad
    /// credentials produce [`AuthOutcome::Rejected`].
    pub async fn validate(&self, credential: &str, accepted: AcceptedSchemes) -> Result<AuthOutcome> {
        match accepted {
            AcceptedSchemes::TokenOnly => Ok(self.try_stateless_token(credential)),
            AcceptedSchemes::KeyOnly => {
                if !ApiKeySecret::is_well_formed(credential) {
                    debug!("rejecting credential that is not shaped like an api key");
                    return Ok(AuthOutcome::Rejected);
                }
                self.try_opaque_key(credential).await
            }
            AcceptedSchemes::Either => match self.try_stateless_token(credential) {
                AuthOutcome::Rejected => self.try_opaque_key(credential).await,
                authenticated @ AuthOutcome::Authenticated(_) => Ok(authenticated),
            },
        }
    }

    /// Verifies a signed token. Never touches storage.
    #[must_use]
    pub fn try_stateless_token(&self, token: &str) -> AuthOutcome {
        let claims = match self.tokens.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "token rejected");
                return AuthOutcome::Rejected;
            }
        };
        match claims.tenant_id() {
            Ok(tenant_id) => AuthOutcome::Authenticated(Identity {
                tenant_id,
                display_name: claims.username,
                scheme: Scheme::Token,
            }),
            Err(e) => {
                debug!(error = %e, "token rejected");
                AuthOutcome::Rejected
            }
        }
    }

    /// Resolves an API key through the cache, falling back to the store.
    ///
    /// On a store hit the mapping is cached before returning and the key's
    /// last-use time is updated in the background.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] if the store cannot be reached.
    pub async fn try_opaque_key(&self, key: &str) -> Result<AuthOutcome> {
        let hash = ApiKeyHash::from_key(key);
        let cache_key = hash.to_hex();

        match self.cache.get(&cache_key).await {
            Ok(Some(cached)) => return Ok(Self::key_identity(cached)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "key cache read failed, treating as miss"),
        }

        let generation = self.revocation_generation(&cache_key);
        let Some(active) = self.store.find_active_key(&hash).await? else {
            debug!("api key unknown or inactive");
            return Ok(AuthOutcome::Rejected);
        };

        let cached = CachedKey {
            key_id: active.key_id,
            tenant_id: active.tenant_id,
            username: active.username,
        };
        if let Err(e) = self
            .cache
            .put(&cache_key, cached.clone(), self.config.key_cache_ttl)
            .await
        {
            warn!(error = %e, tenant_id = %cached.tenant_id, "key cache write failed");
        }

        // Checked after the write: a revocation either cleared the entry
        // above or is visible here.
        if self.revocation_generation(&cache_key) != generation {
            debug!(key_id = %cached.key_id, "api key revoked during lookup");
            if let Err(e) = self.cache.invalidate(&cache_key).await {
                warn!(error = %e, key_id = %cached.key_id, "failed to drop stale cache entry");
            }
            return Ok(AuthOutcome::Rejected);
        }

        self.spawn_touch(cached.key_id);
        Ok(Self::key_identity(cached))
    }

    /// Deactivates a tenant's key and drops its cached mapping.
    ///
    /// The cache entry is gone before this returns, so the key fails
    /// validation immediately.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyNotFound`] if the key does not exist or is
    /// owned by another tenant, or a transient error if the store or cache
    /// fails.
    pub async fn revoke_key(&self, tenant_id: TenantId, key_id: ApiKeyId) -> Result<()> {
        let hash = self
            .store
            .deactivate_key(tenant_id, key_id)
            .await?
            .ok_or(AuthError::KeyNotFound { id: key_id.0 })?;
        let cache_key = hash.to_hex();
        *self.revocations.entry(cache_key.clone()).or_insert(0) += 1;
        self.cache.invalidate(&cache_key).await?;
        debug!(tenant_id = %tenant_id, key_id = %key_id, "api key revoked");
        Ok(())
    }

    /// Returns the token service.
    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    fn revocation_generation(&self, cache_key: &str) -> u64 {
        self.revocations.get(cache_key).map_or(0, |generation| *generation)
    }

    fn key_identity(cached: CachedKey) -> AuthOutcome {
        AuthOutcome::Authenticated(Identity {
            tenant_id: cached.tenant_id,
            display_name: cached.username,
            scheme: Scheme::ApiKey,
        })
    }

    fn spawn_touch(&self, key_id: ApiKeyId) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.touch_key(key_id, Utc::now()).await {
                debug!(error = %e, key_id = %key_id, "failed to update api key last use");
            }
        });
    }
}
