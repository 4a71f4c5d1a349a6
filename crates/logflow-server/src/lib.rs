//! # logflow-server
//!
//! HTTP API and processing runtime for the logflow log backend.
//!
//! This crate provides:
//! - The ingestion gateway that validates and publishes records ([`IngestionGateway`])
//! - Route table and handlers for accounts, keys, ingestion and queries ([`create_router`])
//! - Error mapping to HTTP responses ([`ApiError`])
//! - Configuration and command-line arguments ([`ServerConfig`], [`Cli`])
//! - The server that runs HTTP and the consumer loops together ([`LogflowServer`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use logflow_auth::{TokenConfig, TokenService, ValidatorConfig, DEFAULT_ISSUER};
//! use logflow_queue::MemoryQueueConfig;
//! use logflow_server::{LogflowServer, ServerConfig, Services};
//! use tokio::sync::watch;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let tokens = TokenService::new(TokenConfig::new("a-secret-that-is-at-least-32-bytes!", DEFAULT_ISSUER)?);
//! let services = Services::in_memory(tokens, ValidatorConfig::default(), MemoryQueueConfig::default());
//! let config = ServerConfig::default();
//! let addr = config.bind_addr;
//!
//! let server = LogflowServer::new(config, services);
//! let (_tx, rx) = watch::channel(false);
//! server.bind_and_serve(addr, rx).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{Cli, IngestMode, LogFormat, ServerConfig, DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT};
pub use error::{ApiError, ApiResult};
pub use gateway::{GatewayError, IngestReceipt, IngestionGateway};
pub use handlers::{DeleteResponse, QueryResponse, RecentResponse};
pub use routes::create_router;
pub use server::{LogflowServer, ServerError};
pub use state::{AppState, Services};
