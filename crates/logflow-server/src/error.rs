//! HTTP error mapping.
//!
//! Every failure leaving a handler is an [`ApiError`]. Authentication
//! failures share one body regardless of cause; infrastructure and internal
//! failures are logged and returned with an opaque body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use logflow_auth::AuthError;
use logflow_core::{LogError, TenantId};
use logflow_query::QueryError;
use logflow_queue::QueueError;
use logflow_store::StoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Result type alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by the HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request failed validation.
    #[error("{message}")]
    Validation {
        /// Summary of the failure.
        message: String,
        /// Per-item failures of a batch, as `item N: reason`.
        details: Vec<String>,
    },

    /// Missing or invalid credentials.
    #[error("invalid or missing credentials")]
    Unauthorized,

    /// The resource does not exist or belongs to another tenant.
    #[error("{0} not found")]
    NotFound(String),

    /// The resource already exists.
    #[error("{0}")]
    Conflict(String),

    /// A backing service is unreachable; retrying may succeed.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// A single-message validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    validation_errors: Vec<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation { message, details } => ErrorResponse {
                error: "validation_failed".to_string(),
                message,
                validation_errors: details,
            },
            Self::Unauthorized => ErrorResponse {
                error: "unauthorized".to_string(),
                message: "invalid or missing credentials".to_string(),
                validation_errors: Vec::new(),
            },
            Self::NotFound(what) => ErrorResponse {
                error: "not_found".to_string(),
                message: format!("{what} not found"),
                validation_errors: Vec::new(),
            },
            Self::Conflict(message) => ErrorResponse {
                error: "conflict".to_string(),
                message,
                validation_errors: Vec::new(),
            },
            Self::Unavailable(_) => ErrorResponse {
                error: "service_unavailable".to_string(),
                message: "service temporarily unavailable, retry later".to_string(),
                validation_errors: Vec::new(),
            },
            Self::Internal(_) => ErrorResponse {
                error: "internal_error".to_string(),
                message: "internal server error".to_string(),
                validation_errors: Vec::new(),
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<LogError> for ApiError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::InvalidItems(items) => Self::Validation {
                message: format!("validation failed for {} log(s) in batch", items.len()),
                details: items,
            },
            LogError::Serialization(e) => Self::Internal(e.to_string()),
            other => Self::validation(other.to_string()),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken { .. } | AuthError::TokenExpired | AuthError::InvalidCredentials => {
                Self::Unauthorized
            }
            AuthError::Validation(message) => Self::validation(message),
            AuthError::Conflict { .. } => Self::Conflict(err.to_string()),
            AuthError::KeyNotFound { .. } => Self::NotFound("api key".to_string()),
            AuthError::StoreUnavailable(_) | AuthError::Cache(_) => Self::Unavailable(err.to_string()),
            AuthError::JwtError { .. } | AuthError::PasswordHash { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Unavailable(_) => Self::Unavailable(err.to_string()),
            QueueError::Storage(e) => e.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

/// Attaches the operation and tenant to server-side failures before they
/// become opaque responses.
pub trait OperationContext<T> {
    /// Converts the error and logs it if it is an infrastructure failure.
    fn in_operation(self, operation: &'static str, tenant_id: Option<TenantId>) -> ApiResult<T>;
}

impl<T, E> OperationContext<T> for Result<T, E>
where
    E: Into<ApiError>,
{
    fn in_operation(self, operation: &'static str, tenant_id: Option<TenantId>) -> ApiResult<T> {
        self.map_err(|e| {
            let err = e.into();
            let tenant = tenant_id.map(|t| t.to_string()).unwrap_or_default();
            match &err {
                ApiError::Unavailable(cause) => {
                    warn!(operation, tenant_id = %tenant, error = %cause, "backing service unavailable");
                }
                ApiError::Internal(cause) => {
                    error!(operation, tenant_id = %tenant, error = %cause, "internal error");
                }
                _ => {}
            }
            err
        })
    }
}
