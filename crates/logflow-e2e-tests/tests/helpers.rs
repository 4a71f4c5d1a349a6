//! Test helpers for E2E tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use logflow_auth::{MemoryCredentialStore, MemoryKeyCache, TokenConfig, TokenService, ValidatorConfig, DEFAULT_ISSUER};
use logflow_queue::MemoryQueue;
use logflow_server::{IngestMode, LogflowServer, ServerConfig, Services};
use logflow_store::MemoryLogStorage;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceExt;

/// Default test timeout.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A running server with handles to its in-memory backends.
pub struct TestApp {
    pub router: Router,
    pub server: LogflowServer,
    pub credentials: Arc<MemoryCredentialStore>,
    pub key_cache: Arc<MemoryKeyCache>,
    pub queue: Arc<MemoryQueue>,
    pub storage: Arc<MemoryLogStorage>,
    shutdown_tx: watch::Sender<bool>,
    // Held so the signal can be sent even when no consumer is running.
    shutdown_rx: watch::Receiver<bool>,
    consumers: Vec<JoinHandle<()>>,
}

impl TestApp {
    /// Start an app in the given mode with its consumers running.
    pub fn start(mode: IngestMode) -> Self {
        let credentials = Arc::new(MemoryCredentialStore::new());
        let key_cache = Arc::new(MemoryKeyCache::new());
        let queue = Arc::new(MemoryQueue::new());
        let storage = Arc::new(MemoryLogStorage::new());

        let tokens = TokenService::new(TokenConfig::new([42u8; 32], DEFAULT_ISSUER).unwrap());
        let services = Services {
            tokens: Arc::new(tokens),
            credentials: credentials.clone(),
            key_cache: key_cache.clone(),
            validator: ValidatorConfig::default(),
            queue: queue.clone(),
            storage: storage.clone(),
        };
        let config = ServerConfig::default()
            .with_ingest_mode(mode)
            .with_block(Duration::from_millis(20));

        let server = LogflowServer::new(config, services);
        let router = server.router();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let consumers = server.spawn_consumers(&shutdown_rx);

        Self {
            router,
            server,
            credentials,
            key_cache,
            queue,
            storage,
            shutdown_tx,
            shutdown_rx,
            consumers,
        }
    }

    /// Stop the consumers and wait for them to exit.
    pub async fn shutdown(self) {
        self.shutdown_tx.send(true).unwrap();
        for handle in self.consumers {
            tokio::time::timeout(TEST_TIMEOUT, handle).await.unwrap().unwrap();
        }
    }

    /// Send a request and decode the JSON response.
    pub async fn send(&self, method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(credential) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {credential}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Register a user and return its session token.
    pub async fn register(&self, username: &str) -> String {
        let (status, json) = self
            .send(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "password123",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {json}");
        json["token"].as_str().unwrap().to_string()
    }

    /// Create an API key and return its id and plaintext.
    pub async fn create_key(&self, token: &str, name: &str) -> (u64, String) {
        let (status, json) = self
            .send(Method::POST, "/api/v1/api-keys", Some(token), Some(json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create key failed: {json}");
        (json["id"].as_u64().unwrap(), json["api_key"].as_str().unwrap().to_string())
    }

    /// Register a user with one key; returns (token, key).
    pub async fn tenant(&self, username: &str) -> (String, String) {
        let token = self.register(username).await;
        let (_, key) = self.create_key(&token, "ingest").await;
        (token, key)
    }

    /// Run a query and return its response body.
    pub async fn query(&self, credential: &str, filter: Value) -> Value {
        let (status, json) = self.send(Method::POST, "/api/v1/logs/query", Some(credential), Some(filter)).await;
        assert_eq!(status, StatusCode::OK, "query failed: {json}");
        json
    }

    /// Poll a query until it reports `expected` matches or the timeout elapses.
    pub async fn wait_for_count(&self, credential: &str, filter: Value, expected: u64) -> Value {
        let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
        loop {
            let json = self.query(credential, filter.clone()).await;
            if json["total_count"] == expected || tokio::time::Instant::now() >= deadline {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Build a single-record ingest payload.
pub fn log_entry(source: &str, level: &str, message: &str) -> Value {
    json!({ "source": source, "level": level, "message": message })
}
