//! End-to-end tests for the ingestion pipeline.
//!
//! These tests verify:
//! 1. Queued records are persisted by the consumer loops
//! 2. Persisted records are found by level and source filters
//! 3. Direct mode stores records within the request
//! 4. Stream status reflects queue and consumer progress

mod helpers;

use axum::http::{Method, StatusCode};
use helpers::{log_entry, TestApp};
use logflow_server::IngestMode;
use serde_json::json;

// ============================================================================
// Queued Ingestion
// ============================================================================

#[tokio::test]
async fn test_queued_record_reaches_storage() {
    let app = TestApp::start(IngestMode::Queued);
    let (token, key) = app.tenant("alice").await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/v1/logs/ingest",
            Some(&key),
            Some(log_entry("svc-a", "error", "disk full on /var")),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "queued");

    let found = app
        .wait_for_count(&token, json!({"level": "error", "source": "svc-a"}), 1)
        .await;
    assert_eq!(found["total_count"], 1);
    assert_eq!(found["logs"][0]["message"], "disk full on /var");
    assert_eq!(found["logs"][0]["level"], "ERROR");

    let excluded = app.query(&token, json!({"level": "info"})).await;
    assert_eq!(excluded["total_count"], 0);

    app.shutdown().await;
}

#[tokio::test]
async fn test_queued_batch_reaches_storage() {
    let app = TestApp::start(IngestMode::Queued);
    let (_, key) = app.tenant("alice").await;

    let logs: Vec<_> = (0..25)
        .map(|i| log_entry("svc-batch", "info", &format!("event {i}")))
        .collect();
    let (status, json) = app
        .send(Method::POST, "/api/v1/logs/batch", Some(&key), Some(json!({ "logs": logs })))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["message_ids"].as_array().unwrap().len(), 25);

    let found = app.wait_for_count(&key, json!({"source": "svc-batch"}), 25).await;
    assert_eq!(found["total_count"], 25);
    assert_eq!(app.storage.len(), 25);

    app.shutdown().await;
}

#[tokio::test]
async fn test_stream_status_after_processing() {
    let app = TestApp::start(IngestMode::Queued);
    let (token, key) = app.tenant("alice").await;

    for i in 0..3 {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/v1/logs/ingest",
                Some(&key),
                Some(log_entry("svc-a", "warn", &format!("slow request {i}"))),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    app.wait_for_count(&token, json!({"source": "svc-a"}), 3).await;

    let (status, json) = app.send(Method::GET, "/api/v1/stream/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stream_name"], "logs:incoming");
    assert_eq!(json["stream_length"], 3);
    assert_eq!(json["ingest_mode"], "queued");
    assert_eq!(json["groups"][0]["name"], "log-processors");

    app.shutdown().await;
}

// ============================================================================
// Direct Ingestion
// ============================================================================

#[tokio::test]
async fn test_direct_mode_stores_immediately() {
    let app = TestApp::start(IngestMode::Direct);
    let (token, key) = app.tenant("alice").await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/v1/logs/ingest",
            Some(&key),
            Some(json!({
                "source": "svc-a",
                "level": "debug",
                "message": "cache warmed",
                "service": "billing",
                "fields": {"region": "eu-west-1"}
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "stored");
    assert_eq!(app.storage.len(), 1);

    let found = app.query(&token, json!({"service": "billing"})).await;
    assert_eq!(found["total_count"], 1);
    assert_eq!(found["logs"][0]["fields"]["region"], "eu-west-1");

    let (_, stream) = app.send(Method::GET, "/api/v1/stream/status", Some(&token), None).await;
    assert_eq!(stream["stream_length"], 0);
    assert_eq!(stream["ingest_mode"], "direct");

    app.shutdown().await;
}

#[tokio::test]
async fn test_direct_app_shuts_down_without_consumers() {
    let app = TestApp::start(IngestMode::Direct);
    assert!(app.server.state().consumer_stats().is_empty());
    app.shutdown().await;
}

#[tokio::test]
async fn test_health_reports_queue_outage() {
    let app = TestApp::start(IngestMode::Queued);

    let (status, json) = app.send(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");

    app.queue.set_available(false);
    let (status, json) = app.send(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "degraded");

    app.queue.set_available(true);
    app.shutdown().await;
}
