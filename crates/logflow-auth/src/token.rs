//! Signed session tokens.
//!
//! This module provides HS256 token issuance and verification:
//! - [`TokenClaims`]: Claims carried by a session token
//! - [`TokenConfig`]: Signing secret, issuer and lifetime
//! - [`TokenService`]: Issues and verifies tokens
//!
//! Tokens are stateless: they are never stored and are checked by signature,
//! issuer and expiry only.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use logflow_core::TenantId;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Default token lifetime in hours.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Default issuer claim.
pub const DEFAULT_ISSUER: &str = "log-analytics-system";

/// Minimum HS256 secret length in bytes.
const MIN_SECRET_LEN: usize = 32;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the tenant id.
    pub sub: String,
    /// Display name of the account.
    pub username: String,
    /// Issuer.
    pub iss: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at time (Unix timestamp).
    pub iat: i64,
    /// Not before time (Unix timestamp).
    pub nbf: i64,
    /// Unique token id.
    pub jti: String,
}

impl TokenClaims {
    /// Builds claims for a tenant valid for `ttl` from now.
    #[must_use]
    pub fn new(tenant_id: TenantId, username: impl Into<String>, issuer: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: tenant_id.to_string(),
            username: username.into(),
            iss: issuer.into(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Returns the tenant id from the subject claim.
    ///
    /// # Errors
    ///
    /// Returns an error if the subject is not a tenant id.
    pub fn tenant_id(&self) -> Result<TenantId> {
        TenantId::parse(&self.sub).ok_or_else(|| AuthError::InvalidToken {
            reason: "subject is not a tenant id".to_string(),
        })
    }
}

/// Configuration for token signing and validation.
#[derive(Clone)]
pub struct TokenConfig {
    secret: Vec<u8>,
    issuer: String,
    ttl: Duration,
}

impl TokenConfig {
    /// Creates an HS256 configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is shorter than 32 bytes.
    pub fn new(secret: impl AsRef<[u8]>, issuer: impl Into<String>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::JwtError {
                reason: format!("secret must be at least {MIN_SECRET_LEN} bytes for HS256"),
            });
        }
        Ok(Self {
            secret: secret.to_vec(),
            issuer: issuer.into(),
            ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
        })
    }

    /// Sets the token lifetime.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "nbf", "sub", "iss"]);
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Issues and verifies session tokens.
pub struct TokenService {
    config: TokenConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Creates a service from its configuration.
    #[must_use]
    pub fn new(config: TokenConfig) -> Self {
        let encoding = EncodingKey::from_secret(&config.secret);
        let decoding = DecodingKey::from_secret(&config.secret);
        Self {
            config,
            encoding,
            decoding,
        }
    }

    /// Issues a token for a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn issue(&self, tenant_id: TenantId, username: &str) -> Result<String> {
        let claims = TokenClaims::new(tenant_id, username, &self.config.issuer, self.config.ttl);
        self.encode_claims(&claims)
    }

    /// Verifies signature, issuer and expiry and returns the claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenExpired`] or [`AuthError::InvalidToken`].
    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.config.validation()).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken {
                    reason: e.to_string(),
                },
            }
        })?;
        Ok(data.claims)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &TokenConfig {
        &self.config
    }

    fn encode_claims(&self, claims: &TokenClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| AuthError::JwtError {
            reason: e.to_string(),
        })
    }
}

/// Extracts the credential from an `Authorization: Bearer <credential>` header.
///
/// # Errors
///
/// Returns an error if the header is empty or uses another scheme.
pub fn extract_bearer(header: &str) -> Result<&str> {
    let header = header.trim();
    if header.is_empty() {
        return Err(AuthError::InvalidToken {
            reason: "authorization header is empty".to_string(),
        });
    }
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(AuthError::InvalidToken {
            reason: "invalid authorization header format, expected 'Bearer <credential>'".to_string(),
        })
}
