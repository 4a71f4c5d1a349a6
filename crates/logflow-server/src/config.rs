//! Server configuration and command-line arguments.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use logflow_queue::{DEFAULT_GROUP, DEFAULT_TOPIC};

/// Default number of records returned by `/logs/recent`.
pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// Largest `limit` accepted by `/logs/recent`.
pub const MAX_RECENT_LIMIT: usize = 1000;

/// How accepted records reach storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum IngestMode {
    /// Append to the durable queue; consumers persist asynchronously.
    #[default]
    Queued,
    /// Write straight to storage within the request.
    Direct,
}

impl FromStr for IngestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "direct" => Ok(Self::Direct),
            other => Err(format!("unknown ingest mode: {other}")),
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Configuration for the HTTP server and its processing runtime.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Where ingested records go.
    pub ingest_mode: IngestMode,
    /// Queue topic for incoming records.
    pub topic: String,
    /// Consumer group processing the topic.
    pub group: String,
    /// Number of consumer loops to run.
    pub consumers: usize,
    /// Messages claimed per read.
    pub batch_size: usize,
    /// Upper bound on a blocking read.
    pub block: Duration,
    /// Idle time before a pending message is redelivered.
    pub redelivery_after: Duration,
    /// Topic receiving undecodable envelopes, if any.
    pub dead_letter_topic: Option<String>,
    /// How long to wait for consumers on shutdown.
    pub shutdown_grace: Duration,
    /// CORS allowed origins (empty means all).
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            ingest_mode: IngestMode::Queued,
            topic: DEFAULT_TOPIC.to_string(),
            group: DEFAULT_GROUP.to_string(),
            consumers: 1,
            batch_size: 10,
            block: Duration::from_secs(1),
            redelivery_after: Duration::from_secs(30),
            dead_letter_topic: None,
            shutdown_grace: Duration::from_secs(5),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    /// Set the ingest mode.
    #[must_use]
    pub const fn with_ingest_mode(mut self, mode: IngestMode) -> Self {
        self.ingest_mode = mode;
        self
    }

    /// Set the number of consumer loops.
    #[must_use]
    pub const fn with_consumers(mut self, consumers: usize) -> Self {
        self.consumers = consumers;
        self
    }

    /// Set the per-read batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the blocking read bound.
    #[must_use]
    pub const fn with_block(mut self, block: Duration) -> Self {
        self.block = block;
        self
    }

    /// Set the redelivery interval.
    #[must_use]
    pub const fn with_redelivery_after(mut self, after: Duration) -> Self {
        self.redelivery_after = after;
        self
    }

    /// Set the dead-letter topic.
    #[must_use]
    pub fn with_dead_letter_topic(mut self, topic: impl Into<String>) -> Self {
        self.dead_letter_topic = Some(topic.into());
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Add a CORS allowed origin.
    #[must_use]
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.push(origin.into());
        self
    }
}

/// Command-line arguments of the `logflow` binary.
#[derive(Debug, Parser)]
#[command(name = "logflow")]
#[command(about = "Multi-tenant log ingestion and query service")]
#[command(version)]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "LOGFLOW_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Shared HS256 secret for session tokens (at least 32 bytes)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Issuer claim of session tokens
    #[arg(long, env = "JWT_ISSUER", default_value = logflow_auth::DEFAULT_ISSUER)]
    pub jwt_issuer: String,

    /// Session token lifetime in hours
    #[arg(long, env = "LOGFLOW_TOKEN_TTL_HOURS", default_value_t = 24)]
    pub token_ttl_hours: i64,

    /// How long a validated API key stays cached, in seconds
    #[arg(long, env = "LOGFLOW_KEY_CACHE_TTL_SECS", default_value_t = 900)]
    pub key_cache_ttl_secs: u64,

    /// Where ingested records go
    #[arg(long, env = "LOGFLOW_INGEST_MODE", value_enum, default_value_t = IngestMode::Queued)]
    pub ingest_mode: IngestMode,

    /// Number of consumer loops
    #[arg(long, env = "LOGFLOW_CONSUMERS", default_value_t = 1)]
    pub consumers: usize,

    /// Messages claimed per read
    #[arg(long, env = "LOGFLOW_BATCH_SIZE", default_value_t = 10)]
    pub batch_size: usize,

    /// Upper bound on a blocking read, in milliseconds
    #[arg(long, env = "LOGFLOW_BLOCK_MS", default_value_t = 1000)]
    pub block_ms: u64,

    /// Idle time before a pending message is redelivered, in seconds
    #[arg(long, env = "LOGFLOW_REDELIVERY_SECS", default_value_t = 30)]
    pub redelivery_secs: u64,

    /// Topic receiving undecodable envelopes
    #[arg(long, env = "LOGFLOW_DEAD_LETTER_TOPIC")]
    pub dead_letter_topic: Option<String>,

    /// Seconds to wait for consumers on shutdown
    #[arg(long, env = "LOGFLOW_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOGFLOW_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Builds the server configuration from the parsed arguments.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(self.bind)
            .with_ingest_mode(self.ingest_mode)
            .with_consumers(self.consumers.max(1))
            .with_batch_size(self.batch_size.max(1))
            .with_block(Duration::from_millis(self.block_ms))
            .with_redelivery_after(Duration::from_secs(self.redelivery_secs))
            .with_shutdown_grace(Duration::from_secs(self.shutdown_grace_secs));
        if let Some(topic) = self.dead_letter_topic.as_deref().filter(|t| !t.trim().is_empty()) {
            config = config.with_dead_letter_topic(topic);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.ingest_mode, IngestMode::Queued);
        assert_eq!(config.topic, "logs:incoming");
        assert_eq!(config.group, "log-processors");
        assert_eq!(config.consumers, 1);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.block, Duration::from_secs(1));
        assert_eq!(config.redelivery_after, Duration::from_secs(30));
        assert!(config.dead_letter_topic.is_none());
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::default()
            .with_ingest_mode(IngestMode::Direct)
            .with_consumers(4)
            .with_dead_letter_topic("logs:dead")
            .with_cors_origin("http://localhost:3000");
        assert_eq!(config.ingest_mode, IngestMode::Direct);
        assert_eq!(config.consumers, 4);
        assert_eq!(config.dead_letter_topic.as_deref(), Some("logs:dead"));
        assert_eq!(config.cors_origins.len(), 1);
    }

    #[test_case("queued", IngestMode::Queued ; "queued")]
    #[test_case("DIRECT", IngestMode::Direct ; "direct upper")]
    #[test_case(" direct ", IngestMode::Direct ; "padded")]
    fn test_ingest_mode_parse(input: &str, expected: IngestMode) {
        assert_eq!(input.parse::<IngestMode>().unwrap(), expected);
    }

    #[test]
    fn test_ingest_mode_parse_unknown() {
        assert!("kafka".parse::<IngestMode>().is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["logflow", "--jwt-secret", SECRET]).unwrap();
        assert_eq!(cli.jwt_issuer, "log-analytics-system");
        assert_eq!(cli.token_ttl_hours, 24);
        assert_eq!(cli.key_cache_ttl_secs, 900);
        assert_eq!(cli.log_format, LogFormat::Text);

        let config = cli.server_config();
        assert_eq!(config.ingest_mode, IngestMode::Queued);
        assert_eq!(config.block, Duration::from_millis(1000));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "logflow",
            "--jwt-secret",
            SECRET,
            "--ingest-mode",
            "direct",
            "--consumers",
            "0",
            "--dead-letter-topic",
            "logs:dead",
            "--log-format",
            "json",
        ])
        .unwrap();
        let config = cli.server_config();
        assert_eq!(config.ingest_mode, IngestMode::Direct);
        assert_eq!(config.consumers, 1);
        assert_eq!(config.dead_letter_topic.as_deref(), Some("logs:dead"));
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
