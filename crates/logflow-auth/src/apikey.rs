//! API key generation, hashing and records.
//!
//! - [`ApiKeyId`]: Numeric key identifier
//! - [`ApiKeySecret`]: The plaintext key, shown once at creation
//! - [`ApiKeyHash`]: blake3 digest of the secret, the only form stored
//! - [`ApiKeyRecord`]: Stored key metadata

use std::fmt;

use chrono::{DateTime, Utc};
use logflow_core::TenantId;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AuthError, Result};

/// Prefix that marks a string as an API key.
pub const API_KEY_PREFIX: &str = "lak_";

/// Random bytes in a key; hex-encoded this gives 64 characters.
const API_KEY_RANDOM_BYTES: usize = 32;

/// Longest accepted key name.
const MAX_KEY_NAME_LEN: usize = 100;

/// Identifier of a stored API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKeyId(pub u64);

impl fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A blake3 digest of an API key secret.
#[derive(Clone, Copy)]
pub struct ApiKeyHash {
    hash: [u8; 32],
}

impl ApiKeyHash {
    /// Hashes a plaintext key.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        Self {
            hash: *blake3::hash(key.as_bytes()).as_bytes(),
        }
    }

    /// Checks a plaintext key against this digest in constant time.
    #[must_use]
    pub fn verify(&self, key: &str) -> bool {
        let other = blake3::hash(key.as_bytes());
        self.hash.ct_eq(other.as_bytes()).into()
    }

    /// Lowercase hex of the digest; used as the cache key.
    #[must_use]
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.hash).to_hex().to_string()
    }
}

impl fmt::Debug for ApiKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyHash").field("hash", &"[REDACTED]").finish()
    }
}

impl PartialEq for ApiKeyHash {
    fn eq(&self, other: &Self) -> bool {
        self.hash.ct_eq(&other.hash).into()
    }
}

impl Eq for ApiKeyHash {}

impl std::hash::Hash for ApiKeyHash {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

/// The plaintext API key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ApiKeySecret {
    key: String,
}

impl ApiKeySecret {
    /// Generates a new random key: `lak_` followed by 64 hex characters.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; API_KEY_RANDOM_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let key = format!("{API_KEY_PREFIX}{}", hex_encode(&bytes));
        bytes.zeroize();
        Self { key }
    }

    /// Wraps an existing string.
    #[must_use]
    pub fn from_string(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Hashes this key for storage.
    #[must_use]
    pub fn hash(&self) -> ApiKeyHash {
        ApiKeyHash::from_key(&self.key)
    }

    /// The masked form shown in listings: first 8 and last 4 characters.
    #[must_use]
    pub fn masked(&self) -> String {
        mask_key(&self.key)
    }

    /// Whether `candidate` has the shape of an API key.
    #[must_use]
    pub fn is_well_formed(candidate: &str) -> bool {
        candidate.strip_prefix(API_KEY_PREFIX).is_some_and(|rest| {
            rest.len() == API_KEY_RANDOM_BYTES * 2
                && rest.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        })
    }
}

impl fmt::Debug for ApiKeySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeySecret").field("key", &self.masked()).finish()
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Masks a key as `first8...last4`; short keys are fully hidden.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Validates a key name: 1 to 100 characters after trimming.
///
/// # Errors
///
/// Returns [`AuthError::Validation`] if the name is empty or too long.
pub fn validate_key_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if len == 0 || len > MAX_KEY_NAME_LEN {
        return Err(AuthError::Validation(format!(
            "name must be between 1 and {MAX_KEY_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Stored API key metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    /// Key id.
    pub id: ApiKeyId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Human-readable name.
    pub name: String,
    /// Digest of the secret.
    pub key_hash: ApiKeyHash,
    /// Masked secret for listings.
    pub preview: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last successful validation, updated best-effort.
    pub last_used_at: Option<DateTime<Utc>>,
    /// False once deactivated.
    pub is_active: bool,
}

/// Public view of a key; never carries the full secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyView {
    /// Key id.
    pub id: ApiKeyId,
    /// Masked secret.
    pub api_key: String,
    /// Name.
    pub name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last use.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Whether the key is active.
    pub is_active: bool,
}

impl From<&ApiKeyRecord> for ApiKeyView {
    fn from(record: &ApiKeyRecord) -> Self {
        Self {
            id: record.id,
            api_key: record.preview.clone(),
            name: record.name.clone(),
            created_at: record.created_at,
            last_used_at: record.last_used_at,
            is_active: record.is_active,
        }
    }
}
