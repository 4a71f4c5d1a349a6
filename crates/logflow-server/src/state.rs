//! Shared state for the HTTP server.

use std::sync::Arc;
use std::time::Instant;

use logflow_auth::{
    AccountService, CredentialStore, CredentialValidator, KeyCache, MemoryCredentialStore, MemoryKeyCache,
    TokenService, ValidatorConfig,
};
use logflow_queue::{ConsumerStats, DurableQueue, MemoryQueue, MemoryQueueConfig};
use logflow_store::{LogStorage, MemoryLogStorage};

use crate::config::ServerConfig;
use crate::gateway::IngestionGateway;

/// Backing services the server is wired to.
#[derive(Clone)]
pub struct Services {
    /// Session token issuer and verifier.
    pub tokens: Arc<TokenService>,
    /// Accounts and API keys.
    pub credentials: Arc<dyn CredentialStore>,
    /// Cache of validated API keys.
    pub key_cache: Arc<dyn KeyCache>,
    /// Validator settings.
    pub validator: ValidatorConfig,
    /// Durable queue between the gateway and consumers.
    pub queue: Arc<dyn DurableQueue>,
    /// Log storage.
    pub storage: Arc<dyn LogStorage>,
}

impl Services {
    /// Wires every seam to its in-process implementation.
    #[must_use]
    pub fn in_memory(tokens: TokenService, validator: ValidatorConfig, queue: MemoryQueueConfig) -> Self {
        Self {
            tokens: Arc::new(tokens),
            credentials: Arc::new(MemoryCredentialStore::new()),
            key_cache: Arc::new(MemoryKeyCache::new()),
            validator,
            queue: Arc::new(MemoryQueue::with_config(queue)),
            storage: Arc::new(MemoryLogStorage::new()),
        }
    }
}

/// State shared by all handlers.
pub struct AppState {
    config: ServerConfig,
    validator: Arc<CredentialValidator>,
    accounts: AccountService,
    gateway: IngestionGateway,
    queue: Arc<dyn DurableQueue>,
    storage: Arc<dyn LogStorage>,
    consumer_stats: Vec<Arc<ConsumerStats>>,
    start_time: Instant,
}

impl AppState {
    /// Builds the state from configuration and services.
    #[must_use]
    pub fn new(config: ServerConfig, services: Services, consumer_stats: Vec<Arc<ConsumerStats>>) -> Self {
        let validator = Arc::new(CredentialValidator::new(
            Arc::clone(&services.tokens),
            Arc::clone(&services.credentials),
            Arc::clone(&services.key_cache),
            services.validator,
        ));
        let accounts = AccountService::new(
            Arc::clone(&services.credentials),
            Arc::clone(&services.tokens),
            Arc::clone(&validator),
        );
        let gateway = IngestionGateway::new(
            config.ingest_mode,
            config.topic.clone(),
            Arc::clone(&services.queue),
            Arc::clone(&services.storage),
        );
        Self {
            config,
            validator,
            accounts,
            gateway,
            queue: services.queue,
            storage: services.storage,
            consumer_stats,
            start_time: Instant::now(),
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the credential validator.
    #[must_use]
    pub fn validator(&self) -> &CredentialValidator {
        &self.validator
    }

    /// Get the account service.
    #[must_use]
    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    /// Get the ingestion gateway.
    #[must_use]
    pub fn gateway(&self) -> &IngestionGateway {
        &self.gateway
    }

    /// Get the durable queue.
    #[must_use]
    pub fn queue(&self) -> &Arc<dyn DurableQueue> {
        &self.queue
    }

    /// Get the log storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn LogStorage> {
        &self.storage
    }

    /// Counters of the running consumers.
    #[must_use]
    pub fn consumer_stats(&self) -> &[Arc<ConsumerStats>] {
        &self.consumer_stats
    }

    /// Server uptime in seconds.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
