//! # logflow-auth
//!
//! Authentication for the logflow log backend.
//!
//! This crate provides:
//! - Signed HS256 session tokens ([`TokenService`])
//! - Opaque API keys stored as blake3 digests ([`ApiKeySecret`], [`ApiKeyHash`])
//! - Accounts with argon2 password hashes ([`Account`], [`AccountService`])
//! - A credential store seam and in-memory implementation ([`CredentialStore`])
//! - A cache of validated keys ([`KeyCache`])
//! - Dual-scheme validation with per-endpoint scheme acceptance ([`CredentialValidator`])
//!
//! ## Example
//!
//! ```rust
//! use logflow_auth::{extract_bearer, TokenConfig, TokenService, DEFAULT_ISSUER};
//! use logflow_core::TenantId;
//!
//! let config = TokenConfig::new("a-secret-that-is-at-least-32-bytes!", DEFAULT_ISSUER).unwrap();
//! let tokens = TokenService::new(config);
//!
//! let tenant = TenantId::new();
//! let header = format!("Bearer {}", tokens.issue(tenant, "alice").unwrap());
//!
//! let claims = tokens.verify(extract_bearer(&header).unwrap()).unwrap();
//! assert_eq!(claims.tenant_id().unwrap(), tenant);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod account;
pub mod apikey;
pub mod cache;
pub mod error;
pub mod service;
pub mod store;
pub mod token;
pub mod validator;

pub use account::{hash_password, verify_password, Account, LoginRequest, RegisterRequest};
pub use apikey::{
    mask_key, validate_key_name, ApiKeyHash, ApiKeyId, ApiKeyRecord, ApiKeySecret, ApiKeyView, API_KEY_PREFIX,
};
pub use cache::{CachedKey, KeyCache, MemoryKeyCache};
pub use error::{AuthError, Result};
pub use service::{AccountService, CreatedKey, Session};
pub use store::{ActiveKey, CredentialStore, MemoryCredentialStore};
pub use token::{
    extract_bearer, TokenClaims, TokenConfig, TokenService, DEFAULT_ISSUER, DEFAULT_TOKEN_TTL_HOURS,
};
pub use validator::{
    AcceptedSchemes, AuthOutcome, CredentialValidator, Identity, Scheme, ValidatorConfig, DEFAULT_KEY_CACHE_TTL,
};
