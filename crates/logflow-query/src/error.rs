//! Error types for query compilation.

use thiserror::Error;

/// Errors raised while validating a query filter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// A level value is not one of the five accepted levels.
    #[error("invalid log level: {0} (must be DEBUG, INFO, WARN, ERROR, or FATAL)")]
    InvalidLevel(String),

    /// The sort field is not sortable.
    #[error("invalid sort_by field: {0} (must be timestamp, level, source, or service)")]
    InvalidSortField(String),

    /// The sort order is neither ASC nor DESC.
    #[error("invalid sort_order: {0} (must be ASC or DESC)")]
    InvalidSortOrder(String),

    /// The requested page size exceeds the maximum.
    #[error("limit cannot exceed {max} (got {limit})")]
    LimitTooLarge {
        /// Requested limit.
        limit: i64,
        /// Maximum limit.
        max: i64,
    },

    /// The offset was negative.
    #[error("offset cannot be negative (got {0})")]
    NegativeOffset(i64),

    /// `start_time` is after `end_time`.
    #[error("start_time must be before end_time")]
    InvalidTimeRange,

    /// A relative window was zero or negative.
    #[error("{field} must be greater than zero (got {value})")]
    InvalidWindow {
        /// Offending field name.
        field: &'static str,
        /// Submitted value.
        value: i64,
    },
}

/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
