//! Error types for authentication.

use thiserror::Error;

/// Errors that can occur while authenticating or managing credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token failed signature, issuer or claim validation.
    #[error("invalid token: {reason}")]
    InvalidToken {
        /// The reason the token is invalid.
        reason: String,
    },

    /// The token has expired.
    #[error("token expired")]
    TokenExpired,

    /// Login or key credentials did not match.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Signing configuration or token encoding failed.
    #[error("jwt error: {reason}")]
    JwtError {
        /// The reason the JWT operation failed.
        reason: String,
    },

    /// A submitted payload failed validation.
    #[error("{0}")]
    Validation(String),

    /// An account with the same username or email exists.
    #[error("{field} already exists")]
    Conflict {
        /// The duplicated field.
        field: &'static str,
    },

    /// The key does not exist or belongs to another tenant.
    #[error("api key not found: {id}")]
    KeyNotFound {
        /// The requested key id.
        id: u64,
    },

    /// Password hashing failed.
    #[error("password hash error: {reason}")]
    PasswordHash {
        /// The reason hashing failed.
        reason: String,
    },

    /// The credential store cannot be reached.
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),

    /// The key cache failed.
    #[error("key cache error: {0}")]
    Cache(String),
}

impl AuthError {
    /// Whether the failure is infrastructure-related and retrying may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Cache(_))
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(AuthError::TokenExpired.to_string(), "token expired");
        assert_eq!(
            AuthError::Conflict { field: "username" }.to_string(),
            "username already exists"
        );
        assert_eq!(AuthError::KeyNotFound { id: 7 }.to_string(), "api key not found: 7");
        assert_eq!(
            AuthError::Validation("password must be at least 8 characters long".into()).to_string(),
            "password must be at least 8 characters long"
        );
    }

    #[test]
    fn transient_classification() {
        assert!(AuthError::StoreUnavailable("down".into()).is_transient());
        assert!(AuthError::Cache("timeout".into()).is_transient());
        assert!(!AuthError::InvalidCredentials.is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AuthError>();
    }
}
