//! Bearer credential extraction for handlers.

use axum::http::{header, HeaderMap};
use logflow_auth::{extract_bearer, AcceptedSchemes, AuthOutcome, Identity};
use tracing::debug;

use crate::error::{ApiError, ApiResult, OperationContext};
use crate::state::AppState;

/// Authenticates the request's `Authorization: Bearer` credential.
///
/// Every credential failure maps to [`ApiError::Unauthorized`]; only a
/// credential store outage surfaces differently.
pub async fn authenticate(state: &AppState, headers: &HeaderMap, accepted: AcceptedSchemes) -> ApiResult<Identity> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        debug!("missing authorization header");
        return Err(ApiError::Unauthorized);
    };
    let value = value.to_str().map_err(|_| ApiError::Unauthorized)?;
    let credential = extract_bearer(value).map_err(|_| ApiError::Unauthorized)?;

    match state
        .validator()
        .validate(credential, accepted)
        .await
        .in_operation("authenticate", None)?
    {
        AuthOutcome::Authenticated(identity) => Ok(identity),
        AuthOutcome::Rejected => Err(ApiError::Unauthorized),
    }
}
