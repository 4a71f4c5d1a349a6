//! HTTP request handlers for the logflow API.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use logflow_auth::{AcceptedSchemes, ApiKeyId, ApiKeyView, CreatedKey, LoginRequest, RegisterRequest, Session};
use logflow_core::{BatchIngestRequest, IngestRequest, LogRecord};
use logflow_query::{QueryFilter, compile, compile_delete};
use logflow_queue::{GroupInfo, StatsSnapshot};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::authenticate;
use crate::config::{IngestMode, DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT};
use crate::error::{ApiError, ApiResult, OperationContext};
use crate::gateway::IngestReceipt;
use crate::state::AppState;

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::validation(format!("invalid JSON format: {}", rejection.body_text())))
}

// ===== Health =====

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: &'static str,
    /// Whether the queue answered.
    pub queue_healthy: bool,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// When the check ran.
    pub timestamp: DateTime<Utc>,
}

/// Handle GET /api/v1/health.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let queue_healthy = state.queue().stream_info(&state.config().topic).await.is_ok();
    let (status, code) = if queue_healthy {
        ("healthy", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };
    (
        code,
        Json(HealthResponse {
            status,
            queue_healthy,
            uptime_secs: state.uptime_secs(),
            timestamp: Utc::now(),
        }),
    )
}

// ===== Accounts =====

/// Handle POST /api/v1/auth/register.
pub async fn register(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let request = json_body(body)?;
    let session = state.accounts().register(request).await.in_operation("register", None)?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Handle POST /api/v1/auth/login.
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<Session>> {
    let request = json_body(body)?;
    let session = state.accounts().login(request).await.in_operation("login", None)?;
    info!(tenant_id = %session.user.tenant_id, "user logged in");
    Ok(Json(session))
}

// ===== Ingestion =====

fn receipt_response(receipt: IngestReceipt) -> (StatusCode, Json<IngestReceipt>) {
    let status = match receipt {
        IngestReceipt::Queued { .. } => StatusCode::ACCEPTED,
        IngestReceipt::Stored { .. } => StatusCode::CREATED,
    };
    (status, Json(receipt))
}

/// Handle POST /api/v1/logs/ingest.
pub async fn ingest_log(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<IngestReceipt>)> {
    let identity = authenticate(&state, &headers, AcceptedSchemes::KeyOnly).await?;
    let request = json_body(body)?;
    let receipt = state
        .gateway()
        .ingest(identity.tenant_id, request)
        .await
        .in_operation("ingest", Some(identity.tenant_id))?;
    Ok(receipt_response(receipt))
}

/// Handle POST /api/v1/logs/batch.
pub async fn ingest_batch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<BatchIngestRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<IngestReceipt>)> {
    let identity = authenticate(&state, &headers, AcceptedSchemes::KeyOnly).await?;
    let request = json_body(body)?;
    let receipt = state
        .gateway()
        .ingest_batch(identity.tenant_id, request.logs)
        .await
        .in_operation("ingest_batch", Some(identity.tenant_id))?;
    Ok(receipt_response(receipt))
}

// ===== Query =====

/// Query response.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Matching records for the requested page.
    pub logs: Vec<LogRecord>,
    /// Matches across all pages.
    pub total_count: u64,
    /// Page size.
    pub limit: i64,
    /// Rows skipped.
    pub offset: i64,
    /// When the query ran.
    pub executed_at: DateTime<Utc>,
}

/// Handle POST /api/v1/logs/query.
pub async fn query_logs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<QueryFilter>, JsonRejection>,
) -> ApiResult<Json<QueryResponse>> {
    let identity = authenticate(&state, &headers, AcceptedSchemes::Either).await?;
    let filter = json_body(body)?;
    let executed_at = Utc::now();
    let query = compile(&filter, identity.tenant_id, executed_at)?;

    let storage = state.storage();
    let tenant = Some(identity.tenant_id);
    let logs = storage.query(&query).await.in_operation("query_logs", tenant)?;
    let total_count = storage.count(&query).await.in_operation("count_logs", tenant)?;
    let page = query.pagination().unwrap_or_default();

    Ok(Json(QueryResponse {
        logs,
        total_count,
        limit: page.limit,
        offset: page.offset,
        executed_at,
    }))
}

/// Bulk delete response.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Rows removed.
    pub deleted: u64,
    /// When the delete ran.
    pub executed_at: DateTime<Utc>,
}

/// Handle DELETE /api/v1/logs/query.
pub async fn delete_logs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<QueryFilter>, JsonRejection>,
) -> ApiResult<Json<DeleteResponse>> {
    let identity = authenticate(&state, &headers, AcceptedSchemes::Either).await?;
    let filter = json_body(body)?;
    let executed_at = Utc::now();
    let query = compile_delete(&filter, identity.tenant_id, executed_at)?;

    let deleted = state
        .storage()
        .delete(&query)
        .await
        .in_operation("delete_logs", Some(identity.tenant_id))?;
    info!(tenant_id = %identity.tenant_id, deleted, "logs deleted");
    Ok(Json(DeleteResponse { deleted, executed_at }))
}

/// Query parameters for `/logs/recent`.
#[derive(Debug, Default, Deserialize)]
pub struct RecentParams {
    /// Number of records; defaults to 50, capped at 1000.
    pub limit: Option<i64>,
}

impl RecentParams {
    fn effective_limit(&self) -> usize {
        match self.limit {
            Some(limit) if limit > 0 => (limit as usize).min(MAX_RECENT_LIMIT),
            _ => DEFAULT_RECENT_LIMIT,
        }
    }
}

/// Recent logs response.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecentResponse {
    /// Newest records first.
    pub logs: Vec<LogRecord>,
    /// Number of records returned.
    pub count: usize,
}

/// Handle GET /api/v1/logs/recent.
pub async fn recent_logs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<RecentParams>,
) -> ApiResult<Json<RecentResponse>> {
    let identity = authenticate(&state, &headers, AcceptedSchemes::Either).await?;
    let logs = state
        .storage()
        .recent(identity.tenant_id, params.effective_limit())
        .await
        .in_operation("recent_logs", Some(identity.tenant_id))?;
    Ok(Json(RecentResponse {
        count: logs.len(),
        logs,
    }))
}

// ===== API Keys =====

/// API key creation payload.
#[derive(Debug, Default, Deserialize)]
pub struct CreateKeyRequest {
    /// Key name, 1 to 100 characters.
    #[serde(default)]
    pub name: String,
}

/// Handle POST /api/v1/api-keys.
pub async fn create_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreateKeyRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedKey>)> {
    let identity = authenticate(&state, &headers, AcceptedSchemes::TokenOnly).await?;
    let request = json_body(body)?;
    let created = state
        .accounts()
        .create_key(identity.tenant_id, &request.name)
        .await
        .in_operation("create_api_key", Some(identity.tenant_id))?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Key listing response.
#[derive(Debug, Serialize)]
pub struct ApiKeyList {
    /// Keys with masked secrets.
    pub api_keys: Vec<ApiKeyView>,
}

/// Handle GET /api/v1/api-keys.
pub async fn list_api_keys(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiKeyList>> {
    let identity = authenticate(&state, &headers, AcceptedSchemes::TokenOnly).await?;
    let api_keys = state
        .accounts()
        .list_keys(identity.tenant_id)
        .await
        .in_operation("list_api_keys", Some(identity.tenant_id))?;
    Ok(Json(ApiKeyList { api_keys }))
}

/// Handle DELETE /api/v1/api-keys/{id}.
pub async fn delete_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let identity = authenticate(&state, &headers, AcceptedSchemes::TokenOnly).await?;
    let key_id = id
        .parse::<u64>()
        .map(ApiKeyId)
        .map_err(|_| ApiError::validation(format!("invalid api key id: {id}")))?;
    state
        .accounts()
        .delete_key(identity.tenant_id, key_id)
        .await
        .in_operation("delete_api_key", Some(identity.tenant_id))?;
    Ok(Json(serde_json::json!({ "message": "API key deleted successfully" })))
}

// ===== Stream =====

/// Queue and consumer status.
#[derive(Debug, Serialize)]
pub struct StreamStatus {
    /// Topic the gateway publishes to.
    pub stream_name: String,
    /// Entries held by the topic.
    pub stream_length: usize,
    /// Consumer groups reading the topic.
    pub groups: Vec<GroupInfo>,
    /// Counters of this process's consumers.
    pub consumers: Vec<StatsSnapshot>,
    /// Configured ingest mode.
    pub ingest_mode: &'static str,
}

/// Handle GET /api/v1/stream/status.
pub async fn stream_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<StreamStatus>> {
    let identity = authenticate(&state, &headers, AcceptedSchemes::TokenOnly).await?;
    let info = state
        .queue()
        .stream_info(&state.config().topic)
        .await
        .in_operation("stream_status", Some(identity.tenant_id))?;
    Ok(Json(StreamStatus {
        stream_name: info.topic,
        stream_length: info.length,
        groups: info.groups,
        consumers: state.consumer_stats().iter().map(|s| s.snapshot()).collect(),
        ingest_mode: match state.config().ingest_mode {
            IngestMode::Queued => "queued",
            IngestMode::Direct => "direct",
        },
    }))
}
