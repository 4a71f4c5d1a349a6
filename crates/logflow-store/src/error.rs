//! Error types for log storage.

use thiserror::Error;

/// Errors returned by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend cannot be reached or refused the operation; retrying may succeed.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A record was rejected by the backend.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Whether the caller may retry the operation.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
