//! Consumer-group processing loop.
//!
//! A [`ProcessingConsumer`] reads batches from its group, hands each decoded
//! record to a [`RecordHandler`] and acknowledges only after the handler
//! succeeds. Handler failures leave the entry pending so the queue can
//! redeliver it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{QueueError, Result};
use crate::traits::{DurableQueue, RecordHandler};
use crate::types::{DEFAULT_GROUP, DEFAULT_TOPIC, QueueMessage};

/// Configuration for a [`ProcessingConsumer`].
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Topic to read from.
    pub topic: String,
    /// Consumer group.
    pub group: String,
    /// This consumer's name within the group.
    pub consumer_name: String,
    /// Maximum entries claimed per read.
    pub batch_size: usize,
    /// How long a read blocks when the topic is idle.
    pub block: Duration,
    /// Pause after a failed read.
    pub error_backoff: Duration,
    /// Topic that undecodable entries are copied to before being acknowledged.
    pub dead_letter_topic: Option<String>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            group: DEFAULT_GROUP.to_string(),
            consumer_name: format!("processor-{}", std::process::id()),
            batch_size: 10,
            block: Duration::from_secs(1),
            error_backoff: Duration::from_secs(1),
            dead_letter_topic: None,
        }
    }
}

impl ConsumerConfig {
    /// Sets the topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Sets the group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Sets the consumer name.
    #[must_use]
    pub fn with_consumer_name(mut self, name: impl Into<String>) -> Self {
        self.consumer_name = name.into();
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the read block duration.
    #[must_use]
    pub const fn with_block(mut self, block: Duration) -> Self {
        self.block = block;
        self
    }

    /// Sets the back-off after a failed read.
    #[must_use]
    pub const fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Sets the dead-letter topic.
    #[must_use]
    pub fn with_dead_letter_topic(mut self, topic: Option<String>) -> Self {
        self.dead_letter_topic = topic;
        self
    }
}

/// Counters maintained by a running consumer.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    processed: AtomicU64,
    failed: AtomicU64,
    poisoned: AtomicU64,
    dead_lettered: AtomicU64,
    read_errors: AtomicU64,
}

/// Point-in-time copy of [`ConsumerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Records persisted and acknowledged
    pub processed: u64,
    /// Handler failures left pending
    pub failed: u64,
    /// Undecodable entries acknowledged
    pub poisoned: u64,
    /// Undecodable entries copied to the dead-letter topic
    pub dead_lettered: u64,
    /// Failed reads
    pub read_errors: u64,
}

impl ConsumerStats {
    /// Reads all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            poisoned: self.poisoned.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Outcome of handling one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Acked,
    Pending,
}

/// A consumer-group member that persists records from the queue.
pub struct ProcessingConsumer {
    queue: Arc<dyn DurableQueue>,
    handler: Arc<dyn RecordHandler>,
    config: ConsumerConfig,
    stats: Arc<ConsumerStats>,
}

impl ProcessingConsumer {
    /// Creates a consumer.
    #[must_use]
    pub fn new(queue: Arc<dyn DurableQueue>, handler: Arc<dyn RecordHandler>, config: ConsumerConfig) -> Self {
        Self {
            queue,
            handler,
            config,
            stats: Arc::new(ConsumerStats::default()),
        }
    }

    /// Shared counters for this consumer.
    #[must_use]
    pub fn stats(&self) -> Arc<ConsumerStats> {
        Arc::clone(&self.stats)
    }

    /// The consumer's configuration.
    #[must_use]
    pub const fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Runs until `shutdown` becomes `true` or its sender is dropped.
    ///
    /// The batch in flight when shutdown is signalled is finished before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns an error only if the consumer group cannot be created.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let cfg = &self.config;
        self.queue.ensure_group(&cfg.topic, &cfg.group).await?;

        info!(
            topic = %cfg.topic,
            group = %cfg.group,
            consumer = %cfg.consumer_name,
            "consumer started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let read = tokio::select! {
                read = self.queue.read_group(
                    &cfg.topic,
                    &cfg.group,
                    &cfg.consumer_name,
                    cfg.batch_size,
                    cfg.block,
                ) => read,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            match read {
                Ok(batch) => {
                    for message in batch {
                        self.process(message).await;
                    }
                }
                Err(e) => {
                    ConsumerStats::bump(&self.stats.read_errors);
                    error!(error = %e, topic = %cfg.topic, "failed to read from queue");
                    tokio::select! {
                        () = tokio::time::sleep(cfg.error_backoff) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!(consumer = %cfg.consumer_name, stats = ?self.stats.snapshot(), "consumer stopped");
        Ok(())
    }

    async fn process(&self, message: QueueMessage) -> Disposition {
        let record = match message.envelope.decode() {
            Ok(record) => record,
            Err(e) => return self.reject_poison(&message, &e).await,
        };
        let tenant_id = record.tenant_id;

        if let Err(e) = self.handler.handle(record).await {
            ConsumerStats::bump(&self.stats.failed);
            warn!(
                message_id = %message.id,
                tenant_id = %tenant_id,
                delivery_count = message.delivery_count,
                error = %e,
                "handler failed, leaving message pending"
            );
            return Disposition::Pending;
        }

        ConsumerStats::bump(&self.stats.processed);
        self.acknowledge(&message).await;
        debug!(message_id = %message.id, tenant_id = %tenant_id, "message processed");
        Disposition::Acked
    }

    async fn reject_poison(&self, message: &QueueMessage, reason: &QueueError) -> Disposition {
        warn!(message_id = %message.id, error = %reason, "dropping poison message");

        if let Some(topic) = &self.config.dead_letter_topic {
            let dead = message.envelope.dead_letter(message.id, &reason.to_string());
            if let Err(e) = self.queue.append(topic, dead).await {
                error!(message_id = %message.id, error = %e, "dead-letter append failed, leaving pending");
                return Disposition::Pending;
            }
            ConsumerStats::bump(&self.stats.dead_lettered);
        }

        ConsumerStats::bump(&self.stats.poisoned);
        self.acknowledge(message).await;
        Disposition::Acked
    }

    async fn acknowledge(&self, message: &QueueMessage) {
        let cfg = &self.config;
        match self.queue.ack(&cfg.topic, &cfg.group, message.id).await {
            Ok(true) => {}
            Ok(false) => debug!(message_id = %message.id, "message was no longer pending"),
            Err(e) => warn!(message_id = %message.id, error = %e, "failed to acknowledge message"),
        }
    }
}
