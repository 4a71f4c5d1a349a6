//! Accounts, registration payloads and password hashing.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use logflow_core::TenantId;
use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 50;
const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .unwrap_or_else(|_| unreachable!("email pattern is a valid regex"))
});

/// A registered account; its id is the tenant id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Tenant id owning all of this account's logs and keys.
    pub tenant_id: TenantId,
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Inactive accounts cannot authenticate.
    pub is_active: bool,
}

/// Registration payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    /// Login name, 3 to 50 characters.
    #[serde(default)]
    pub username: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Password, at least 8 characters.
    #[serde(default)]
    pub password: String,
}

impl RegisterRequest {
    /// Validates the payload.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        let name_len = self.username.chars().count();
        if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&name_len) {
            return Err(AuthError::Validation(format!(
                "username must be between {MIN_USERNAME_LEN} and {MAX_USERNAME_LEN} characters"
            )));
        }
        if !EMAIL_RE.is_match(&self.email) {
            return Err(AuthError::Validation("invalid email format".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }
        Ok(())
    }
}

/// Login payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    /// Login name.
    #[serde(default)]
    pub username: String,
    /// Password.
    #[serde(default)]
    pub password: String,
}

/// Hashes a password into an argon2 PHC string with a random salt.
///
/// # Errors
///
/// Returns [`AuthError::PasswordHash`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::PasswordHash {
        reason: e.to_string(),
    })?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::PasswordHash {
            reason: e.to_string(),
        })
}

/// Checks a password against a stored PHC string.
#[must_use]
pub fn verify_password(password: &str, phc: &str) -> bool {
    PasswordHash::new(phc)
        .is_ok_and(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn make_test_request() -> RegisterRequest {
        RegisterRequest {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "correct horse".to_string(),
        }
    }

    #[test]
    fn valid_registration() {
        assert!(make_test_request().validate().is_ok());
    }

    #[test_case("ab" ; "too short")]
    #[test_case(&"a".repeat(51) ; "too long")]
    fn bad_username(username: &str) {
        let req = RegisterRequest {
            username: username.to_string(),
            ..make_test_request()
        };
        assert!(matches!(req.validate(), Err(AuthError::Validation(m)) if m.contains("username")));
    }

    #[test_case("alice" ; "no at")]
    #[test_case("alice@example" ; "no tld")]
    #[test_case("alice@example.c" ; "short tld")]
    #[test_case("al ice@example.com" ; "space")]
    fn bad_email(email: &str) {
        let req = RegisterRequest {
            email: email.to_string(),
            ..make_test_request()
        };
        assert!(matches!(req.validate(), Err(AuthError::Validation(m)) if m.contains("email")));
    }

    #[test]
    fn short_password() {
        let req = RegisterRequest {
            password: "1234567".to_string(),
            ..make_test_request()
        };
        assert!(matches!(req.validate(), Err(AuthError::Validation(m)) if m.contains("password")));
    }

    #[test]
    fn password_hash_roundtrip() {
        let phc = hash_password("hunter22").unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password("hunter22", &phc));
        assert!(!verify_password("hunter23", &phc));
        assert!(!verify_password("hunter22", "not-a-phc-string"));
    }

    #[test]
    fn password_hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn account_json_hides_password_hash() {
        let account = Account {
            tenant_id: TenantId::new(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            is_active: true,
        };
        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("alice@example.com"));
    }
}
