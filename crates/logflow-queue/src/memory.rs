//! In-process durable queue with consumer groups.
//!
//! Entries are kept for the life of the process. Each group tracks the last
//! delivered id and a pending list; pending entries idle for longer than the
//! redelivery interval are handed to the next reader of the group.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{QueueError, Result};
use crate::traits::DurableQueue;
use crate::types::{Envelope, GroupInfo, MessageId, QueueMessage, StreamInfo};

/// Configuration for [`MemoryQueue`].
#[derive(Debug, Clone)]
pub struct MemoryQueueConfig {
    /// How long a pending entry must sit unacknowledged before redelivery.
    pub redelivery_after: Duration,
}

impl Default for MemoryQueueConfig {
    fn default() -> Self {
        Self {
            redelivery_after: Duration::from_secs(30),
        }
    }
}

impl MemoryQueueConfig {
    /// Sets the redelivery interval.
    #[must_use]
    pub const fn with_redelivery_after(mut self, after: Duration) -> Self {
        self.redelivery_after = after;
        self
    }
}

#[derive(Debug)]
struct PendingEntry {
    consumer: String,
    delivered_at: Instant,
    delivery_count: u32,
}

#[derive(Debug, Default)]
struct Group {
    last_delivered: Option<MessageId>,
    pending: BTreeMap<MessageId, PendingEntry>,
    consumers: HashSet<String>,
}

#[derive(Debug, Default)]
struct Topic {
    entries: BTreeMap<MessageId, Envelope>,
    last_id: Option<MessageId>,
    groups: HashMap<String, Group>,
}

impl Topic {
    fn next_id(&mut self) -> MessageId {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let id = match self.last_id {
            Some(last) if last.millis >= now => MessageId::new(last.millis, last.seq + 1),
            _ => MessageId::new(now, 0),
        };
        self.last_id = Some(id);
        id
    }
}

/// In-memory [`DurableQueue`].
pub struct MemoryQueue {
    config: MemoryQueueConfig,
    topics: Mutex<HashMap<String, Topic>>,
    notify: Notify,
    available: AtomicBool,
}

impl MemoryQueue {
    /// Creates a queue with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MemoryQueueConfig::default())
    }

    /// Creates a queue with the given configuration.
    #[must_use]
    pub fn with_config(config: MemoryQueueConfig) -> Self {
        Self {
            config,
            topics: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Marks the queue available or unavailable.
    ///
    /// While unavailable every operation fails with [`QueueError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(QueueError::Unavailable("memory queue is offline".to_string()))
        }
    }

    /// Claims idle pending entries first, then new ones, up to `max_batch`.
    fn claim(&self, topic: &str, group: &str, consumer: &str, max_batch: usize) -> Result<Vec<QueueMessage>> {
        let mut topics = self.topics.lock();
        let not_found = || QueueError::GroupNotFound {
            topic: topic.to_string(),
            group: group.to_string(),
        };
        let state = topics.get_mut(topic).ok_or_else(not_found)?;
        let Topic { entries, groups, .. } = state;
        let grp = groups.get_mut(group).ok_or_else(not_found)?;
        grp.consumers.insert(consumer.to_string());

        let now = Instant::now();
        let mut claimed = Vec::new();

        for (id, pending) in &mut grp.pending {
            if claimed.len() >= max_batch {
                break;
            }
            if now.duration_since(pending.delivered_at) < self.config.redelivery_after {
                continue;
            }
            let Some(envelope) = entries.get(id) else {
                continue;
            };
            pending.consumer = consumer.to_string();
            pending.delivered_at = now;
            pending.delivery_count += 1;
            debug!(message_id = %id, consumer, delivery_count = pending.delivery_count, "redelivering");
            claimed.push(QueueMessage {
                id: *id,
                envelope: envelope.clone(),
                delivery_count: pending.delivery_count,
            });
        }

        let start = grp.last_delivered.map_or(Bound::Unbounded, Bound::Excluded);
        let fresh: Vec<(MessageId, Envelope)> = entries
            .range((start, Bound::Unbounded))
            .take(max_batch - claimed.len())
            .map(|(id, env)| (*id, env.clone()))
            .collect();
        for (id, envelope) in fresh {
            grp.last_delivered = Some(id);
            grp.pending.insert(
                id,
                PendingEntry {
                    consumer: consumer.to_string(),
                    delivered_at: now,
                    delivery_count: 1,
                },
            );
            claimed.push(QueueMessage {
                id,
                envelope,
                delivery_count: 1,
            });
        }

        Ok(claimed)
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableQueue for MemoryQueue {
    async fn append(&self, topic: &str, envelope: Envelope) -> Result<MessageId> {
        let ids = self.append_batch(topic, vec![envelope]).await?;
        ids.into_iter()
            .next()
            .ok_or_else(|| QueueError::Unavailable("append produced no id".to_string()))
    }

    async fn append_batch(&self, topic: &str, envelopes: Vec<Envelope>) -> Result<Vec<MessageId>> {
        self.check_available()?;
        let ids = {
            let mut topics = self.topics.lock();
            let state = topics.entry(topic.to_string()).or_default();
            envelopes
                .into_iter()
                .map(|envelope| {
                    let id = state.next_id();
                    state.entries.insert(id, envelope);
                    id
                })
                .collect::<Vec<_>>()
        };
        self.notify.notify_waiters();
        Ok(ids)
    }

    async fn read_group(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        max_batch: usize,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>> {
        let max_batch = max_batch.max(1);
        let deadline = Instant::now() + wait;
        loop {
            // Registered before claiming so an append in between is not missed.
            let notified = self.notify.notified();
            self.check_available()?;
            let batch = self.claim(topic, group, consumer, max_batch)?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(batch);
            }
            let _ = tokio::time::timeout(deadline - now, notified).await;
        }
    }

    async fn ack(&self, topic: &str, group: &str, id: MessageId) -> Result<bool> {
        self.check_available()?;
        let mut topics = self.topics.lock();
        let removed = topics
            .get_mut(topic)
            .and_then(|t| t.groups.get_mut(group))
            .is_some_and(|g| g.pending.remove(&id).is_some());
        Ok(removed)
    }

    async fn ensure_group(&self, topic: &str, group: &str) -> Result<()> {
        self.check_available()?;
        let mut topics = self.topics.lock();
        topics
            .entry(topic.to_string())
            .or_default()
            .groups
            .entry(group.to_string())
            .or_default();
        Ok(())
    }

    async fn stream_info(&self, topic: &str) -> Result<StreamInfo> {
        self.check_available()?;
        let topics = self.topics.lock();
        let Some(state) = topics.get(topic) else {
            return Ok(StreamInfo {
                topic: topic.to_string(),
                length: 0,
                groups: Vec::new(),
            });
        };
        let mut groups: Vec<GroupInfo> = state
            .groups
            .iter()
            .map(|(name, g)| GroupInfo {
                name: name.clone(),
                pending: g.pending.len(),
                consumers: g.consumers.len(),
                last_delivered: g.last_delivered,
            })
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(StreamInfo {
            topic: topic.to_string(),
            length: state.entries.len(),
            groups,
        })
    }
}
