use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{ChannelError, Delivery, LeaseId, Message, MessageChannel, MessageId, Result};

/// A message parked after a permanent failure.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message: Message,
    pub attempts: u32,
    pub reason: String,
}

#[derive(Debug)]
struct Lease {
    id: LeaseId,
    message: Message,
    attempt: u32,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    /// Visible messages with the number of times each was already delivered.
    ready: VecDeque<(Message, u32)>,
    leased: HashMap<MessageId, Lease>,
    dead: Vec<DeadLetter>,
}

impl QueueState {
    fn contains(&self, id: MessageId) -> bool {
        self.leased.contains_key(&id) || self.ready.iter().any(|(m, _)| m.id == id)
    }

    /// Returns expired leases to the front of the queue, oldest first.
    fn reclaim_expired(&mut self, now: Instant) {
        let mut expired: Vec<MessageId> = self
            .leased
            .iter()
            .filter(|(_, lease)| lease.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();
        if expired.is_empty() {
            return;
        }
        expired.sort_by_key(|id| std::cmp::Reverse(self.leased[id].message.published_at));
        for id in expired {
            if let Some(lease) = self.leased.remove(&id) {
                tracing::warn!(
                    message_id = %id,
                    attempt = lease.attempt,
                    "lease expired, message becomes visible again"
                );
                self.ready.push_front((lease.message, lease.attempt));
            }
        }
    }

    fn take_lease(&mut self, queue: &str, delivery: &Delivery) -> Result<Lease> {
        let id = delivery.message.id;
        let current = self
            .leased
            .get(&id)
            .is_some_and(|lease| lease.id == delivery.lease);
        if current && let Some(lease) = self.leased.remove(&id) {
            return Ok(lease);
        }
        Err(ChannelError::UnknownDelivery {
            queue: queue.to_string(),
            message_id: id,
        })
    }
}

/// In-process message channel.
///
/// Queues live as long as the channel value, so consumers can be stopped and
/// restarted without losing messages. Cloning shares the queues.
#[derive(Clone)]
pub struct InMemoryMessageChannel {
    queues: Arc<Mutex<HashMap<String, QueueState>>>,
    lease_timeout: Duration,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryMessageChannel {
    /// Creates a channel with a 30 second lease.
    pub fn new() -> Self {
        Self::with_lease_timeout(Duration::from_secs(30))
    }

    pub fn with_lease_timeout(lease_timeout: Duration) -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            lease_timeout,
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes every call fail with [`ChannelError::Unavailable`] (for testing).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Messages waiting or leased on `queue`, oldest first.
    pub async fn pending(&self, queue: &str) -> Vec<Message> {
        let queues = self.queues.lock().await;
        let Some(state) = queues.get(queue) else {
            return Vec::new();
        };
        let mut messages: Vec<Message> = state
            .ready
            .iter()
            .map(|(m, _)| m.clone())
            .chain(state.leased.values().map(|l| l.message.clone()))
            .collect();
        messages.sort_by_key(|m| m.published_at);
        messages
    }

    /// Number of messages currently leased on `queue`.
    pub async fn in_flight(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .await
            .get(queue)
            .map_or(0, |state| state.leased.len())
    }

    /// Messages dead-lettered on `queue`.
    pub async fn dead_letters(&self, queue: &str) -> Vec<DeadLetter> {
        self.queues
            .lock()
            .await
            .get(queue)
            .map(|state| state.dead.clone())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable(
                "in-memory channel switched off".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryMessageChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageChannel for InMemoryMessageChannel {
    async fn publish(&self, queue: &str, message: Message) -> Result<()> {
        self.check_available()?;
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();
        if state.contains(message.id) {
            tracing::debug!(queue, message_id = %message.id, "duplicate publish ignored");
            return Ok(());
        }
        state.ready.push_back((message, 0));
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<Option<Delivery>> {
        self.check_available()?;
        let now = Instant::now();
        let mut queues = self.queues.lock().await;
        let Some(state) = queues.get_mut(queue) else {
            return Ok(None);
        };
        state.reclaim_expired(now);

        let Some((message, delivered)) = state.ready.pop_front() else {
            return Ok(None);
        };
        let lease = Lease {
            id: LeaseId::new(),
            message: message.clone(),
            attempt: delivered + 1,
            expires_at: now + self.lease_timeout,
        };
        let delivery = Delivery {
            queue: queue.to_string(),
            message,
            attempt: lease.attempt,
            lease: lease.id,
        };
        state.leased.insert(delivery.message.id, lease);
        Ok(Some(delivery))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.check_available()?;
        let mut queues = self.queues.lock().await;
        let state = queues.entry(delivery.queue.clone()).or_default();
        state.take_lease(&delivery.queue, delivery)?;
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<()> {
        self.check_available()?;
        let mut queues = self.queues.lock().await;
        let state = queues.entry(delivery.queue.clone()).or_default();
        let lease = state.take_lease(&delivery.queue, delivery)?;
        state.ready.push_back((lease.message, lease.attempt));
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<()> {
        self.check_available()?;
        let mut queues = self.queues.lock().await;
        let state = queues.entry(delivery.queue.clone()).or_default();
        let lease = state.take_lease(&delivery.queue, delivery)?;
        state.dead.push(DeadLetter {
            message: lease.message,
            attempts: lease.attempt,
            reason: reason.to_string(),
        });
        Ok(())
    }
}
