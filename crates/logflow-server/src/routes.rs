//! Route configuration for the logflow API.

use std::sync::Arc;

use axum::routing::{delete, get, post, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handlers::{
    create_api_key, delete_api_key, delete_logs, health_check, ingest_batch, ingest_log, list_api_keys, login,
    query_logs, recent_logs, register, stream_status,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(state.config());

    let api_routes = Router::new()
        // Public
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        // API key only
        .route("/logs/ingest", post(ingest_log))
        .route("/logs/batch", post(ingest_batch))
        // Token or API key
        .route("/logs/query", post(query_logs).delete(delete_logs))
        .route("/logs/recent", get(recent_logs))
        // Token only
        .route("/api-keys", post(create_api_key).get(list_api_keys))
        .route("/api-keys/{id}", delete(delete_api_key))
        .route("/stream/status", get(stream_status));

    Router::new()
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<_> = config.cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
    }
}
