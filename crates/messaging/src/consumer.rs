//! Queue consumer workers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::{Delivery, Message, MessageChannel, Result};

/// Failure reported by a [`MessageHandler`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Worth retrying later; the message is released for redelivery.
    #[error("transient: {0}")]
    Transient(String),

    /// Will never succeed; the message is dead-lettered.
    #[error("permanent: {0}")]
    Permanent(String),
}

/// Handles messages of one queue.
///
/// Implementations must be idempotent: the same message can arrive more
/// than once.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Queue this handler consumes.
    fn queue(&self) -> &'static str;

    async fn handle(&self, message: &Message) -> std::result::Result<(), HandlerError>;
}

/// How a single delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Acked,
    Requeued,
    DeadLettered,
}

/// Consumer tuning.
#[derive(Debug, Clone, Copy)]
pub struct ConsumerConfig {
    /// Sleep between polls of an empty queue.
    pub poll_interval: Duration,
    /// Deliveries after which a transiently failing message is dead-lettered.
    pub max_attempts: u32,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            max_attempts: 5,
        }
    }
}

/// Polls one queue and settles each delivery according to the handler result.
pub struct Consumer<C: MessageChannel + ?Sized, H: MessageHandler + ?Sized> {
    channel: Arc<C>,
    handler: Arc<H>,
    config: ConsumerConfig,
}

impl<C: MessageChannel + ?Sized, H: MessageHandler + ?Sized> Clone for Consumer<C, H> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            handler: self.handler.clone(),
            config: self.config,
        }
    }
}

impl<C, H> Consumer<C, H>
where
    C: MessageChannel + ?Sized + 'static,
    H: MessageHandler + ?Sized + 'static,
{
    pub fn new(channel: Arc<C>, handler: Arc<H>, config: ConsumerConfig) -> Self {
        Self {
            channel,
            handler,
            config,
        }
    }

    /// Leases and handles at most one message.
    ///
    /// Returns `Ok(None)` when the queue is empty.
    pub async fn process_next(&self) -> Result<Option<ProcessOutcome>> {
        let queue = self.handler.queue();
        let Some(delivery) = self.channel.consume(queue).await? else {
            return Ok(None);
        };

        let outcome = match self.handler.handle(&delivery.message).await {
            Ok(()) => {
                self.channel.ack(&delivery).await?;
                metrics::counter!("messages_acked_total", "queue" => queue).increment(1);
                ProcessOutcome::Acked
            }
            Err(HandlerError::Transient(reason)) if delivery.attempt < self.config.max_attempts => {
                tracing::warn!(
                    queue,
                    message_id = %delivery.message.id,
                    attempt = delivery.attempt,
                    %reason,
                    "handler failed, message will be redelivered"
                );
                self.channel.nack(&delivery).await?;
                metrics::counter!("messages_redelivered_total", "queue" => queue).increment(1);
                ProcessOutcome::Requeued
            }
            Err(e) => {
                self.dead_letter(&delivery, &e).await?;
                ProcessOutcome::DeadLettered
            }
        };
        Ok(Some(outcome))
    }

    async fn dead_letter(&self, delivery: &Delivery, error: &HandlerError) -> Result<()> {
        let queue = self.handler.queue();
        tracing::error!(
            queue,
            message_id = %delivery.message.id,
            kind = %delivery.message.kind,
            attempt = delivery.attempt,
            error = %error,
            "message dead-lettered"
        );
        self.channel.dead_letter(delivery, &error.to_string()).await?;
        metrics::counter!("messages_dead_lettered_total", "queue" => queue).increment(1);
        Ok(())
    }

    /// Processes messages until `shutdown` turns true or its sender is dropped.
    ///
    /// Channel errors are logged and the worker backs off for one poll
    /// interval; they never stop the loop.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let queue = self.handler.queue();
        tracing::info!(queue, "consumer started");

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            match self.process_next().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => tracing::warn!(queue, error = %e, "consume failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(queue, "consumer stopped");
    }

    /// Spawns `workers` copies of this consumer onto `tasks`.
    pub fn spawn_workers(
        &self,
        workers: usize,
        shutdown: &watch::Receiver<bool>,
        tasks: &mut JoinSet<()>,
    ) {
        for _ in 0..workers.max(1) {
            tasks.spawn(self.clone().run(shutdown.clone()));
        }
    }
}
