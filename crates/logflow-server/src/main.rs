//! logflow - multi-tenant log ingestion and query service
//!
//! Serves the HTTP API and runs the consumer loops that move queued
//! records into storage.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use logflow_auth::{TokenConfig, TokenService, ValidatorConfig};
use logflow_queue::MemoryQueueConfig;
use logflow_server::{Cli, LogFormat, LogflowServer, Services};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let (text, json) = match cli.log_format {
        LogFormat::Text => (Some(fmt::layer()), None),
        LogFormat::Json => (None, Some(fmt::layer().json())),
    };
    tracing_subscriber::registry().with(filter).with(text).with(json).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let token_config = TokenConfig::new(&cli.jwt_secret, cli.jwt_issuer.clone())
        .context("invalid JWT configuration")?
        .with_ttl(chrono::Duration::hours(cli.token_ttl_hours.max(1)));
    let validator = ValidatorConfig::default().with_key_cache_ttl(Duration::from_secs(cli.key_cache_ttl_secs));
    let config = cli.server_config();
    let queue = MemoryQueueConfig::default().with_redelivery_after(config.redelivery_after);

    info!(
        bind = %config.bind_addr,
        ingest_mode = ?config.ingest_mode,
        consumers = config.consumers,
        "starting logflow"
    );

    let addr = config.bind_addr;
    let services = Services::in_memory(TokenService::new(token_config), validator, queue);
    let server = LogflowServer::new(config, services);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    server.bind_and_serve(addr, shutdown_rx).await?;
    Ok(())
}
