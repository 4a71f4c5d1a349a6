//! Server and processing runtime.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::join_all;
use logflow_queue::{ConsumerConfig, ProcessingConsumer, RecordHandler, StorageHandler};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{IngestMode, ServerConfig};
use crate::routes::create_router;
use crate::state::{AppState, Services};

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    /// The HTTP server failed.
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// The HTTP API plus the consumer loops that drain the queue.
pub struct LogflowServer {
    state: Arc<AppState>,
    consumers: Vec<Arc<ProcessingConsumer>>,
}

impl LogflowServer {
    /// Wires the server. Consumers are created only in queued mode.
    #[must_use]
    pub fn new(config: ServerConfig, services: Services) -> Self {
        let consumers: Vec<Arc<ProcessingConsumer>> = if config.ingest_mode == IngestMode::Queued {
            let handler: Arc<dyn RecordHandler> = Arc::new(StorageHandler::new(Arc::clone(&services.storage)));
            (0..config.consumers)
                .map(|index| {
                    let mut consumer_config = ConsumerConfig::default()
                        .with_topic(config.topic.clone())
                        .with_group(config.group.clone())
                        .with_batch_size(config.batch_size)
                        .with_block(config.block)
                        .with_dead_letter_topic(config.dead_letter_topic.clone());
                    if config.consumers > 1 {
                        let name = format!("{}-{index}", consumer_config.consumer_name);
                        consumer_config = consumer_config.with_consumer_name(name);
                    }
                    Arc::new(ProcessingConsumer::new(
                        Arc::clone(&services.queue),
                        Arc::clone(&handler),
                        consumer_config,
                    ))
                })
                .collect()
        } else {
            Vec::new()
        };
        let stats = consumers.iter().map(|c| c.stats()).collect();
        let state = Arc::new(AppState::new(config, services, stats));
        Self { state, consumers }
    }

    /// Get the shared state.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Create the router without starting the server.
    pub fn router(&self) -> axum::Router {
        create_router(Arc::clone(&self.state))
    }

    /// Starts the consumer loops; each stops when `shutdown` turns true.
    pub fn spawn_consumers(&self, shutdown: &watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.consumers
            .iter()
            .map(|consumer| {
                let consumer = Arc::clone(consumer);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    let name = consumer.config().consumer_name.clone();
                    if let Err(e) = consumer.run(shutdown).await {
                        error!(consumer = %name, error = %e, "consumer stopped with error");
                    }
                })
            })
            .collect()
    }

    /// Serves HTTP on `listener` and runs the consumers until `shutdown`
    /// turns true, then waits up to the grace period for consumers.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server fails.
    pub async fn serve(&self, listener: TcpListener, shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        let consumers = self.spawn_consumers(&shutdown);
        info!(
            addr = ?listener.local_addr().ok(),
            consumers = consumers.len(),
            ingest_mode = ?self.state.config().ingest_mode,
            "logflow listening"
        );

        let mut signal = shutdown;
        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                while !*signal.borrow_and_update() {
                    if signal.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await
            .map_err(ServerError::Serve);

        let grace = self.state.config().shutdown_grace;
        if tokio::time::timeout(grace, join_all(consumers)).await.is_err() {
            warn!(grace_secs = grace.as_secs(), "consumers did not stop within the grace period");
        }
        info!("logflow shut down");
        served
    }

    /// Binds `addr` and serves until `shutdown` turns true.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or the HTTP server fails.
    pub async fn bind_and_serve(&self, addr: SocketAddr, shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(addr, e))?;
        self.serve(listener, shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use logflow_auth::{TokenConfig, TokenService, ValidatorConfig, DEFAULT_ISSUER};
    use logflow_core::{LogLevel, LogRecord, TenantId};
    use logflow_queue::{Envelope, MemoryQueueConfig, DEFAULT_TOPIC};

    fn make_test_services() -> Services {
        let tokens = TokenService::new(TokenConfig::new([13u8; 32], DEFAULT_ISSUER).unwrap());
        Services::in_memory(tokens, ValidatorConfig::default(), MemoryQueueConfig::default())
    }

    #[test]
    fn test_direct_mode_has_no_consumers() {
        let config = ServerConfig::default().with_ingest_mode(IngestMode::Direct).with_consumers(3);
        let server = LogflowServer::new(config, make_test_services());
        assert!(server.state().consumer_stats().is_empty());
    }

    #[test]
    fn test_queued_mode_consumer_count() {
        let config = ServerConfig::default().with_consumers(3);
        let server = LogflowServer::new(config, make_test_services());
        assert_eq!(server.state().consumer_stats().len(), 3);
    }

    #[tokio::test]
    async fn test_consumers_persist_queued_records() {
        let services = make_test_services();
        let config = ServerConfig::default().with_block(Duration::from_millis(20));
        let server = LogflowServer::new(config, services.clone());

        let (tx, rx) = watch::channel(false);
        let handles = server.spawn_consumers(&rx);

        let record = LogRecord::builder()
            .tenant_id(TenantId::new())
            .source("svc-a")
            .level(LogLevel::Info)
            .message("hello")
            .build()
            .unwrap();
        services
            .queue
            .append(DEFAULT_TOPIC, Envelope::encode(&record).unwrap())
            .await
            .unwrap();

        let mut stored = 0;
        for _ in 0..50 {
            stored = services.storage.recent(record.tenant_id, 10).await.unwrap().len();
            if stored == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(stored, 1);

        tx.send(true).unwrap();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        }
        assert_eq!(server.state().consumer_stats()[0].snapshot().processed, 1);
    }

    #[tokio::test]
    async fn test_serve_with_shutdown() {
        let config = ServerConfig::default()
            .with_block(Duration::from_millis(20))
            .with_shutdown_grace(Duration::from_secs(1));
        let server = LogflowServer::new(config, make_test_services());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { server.serve(listener, rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(result.unwrap().unwrap().is_ok());
    }
}
