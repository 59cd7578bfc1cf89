use std::sync::Arc;

use serde::Serialize;

use common::RetryPolicy;

use crate::{ChannelError, Message, MessageChannel, MessageId, Result};

/// Publishes typed payloads with bounded retry.
///
/// The [`Message`] (and therefore its id and the idempotency token inside
/// the payload) is built once before the first attempt; every retry sends
/// the identical message.
pub struct EventPublisher<C: MessageChannel + ?Sized> {
    channel: Arc<C>,
    retry: RetryPolicy,
}

impl<C: MessageChannel + ?Sized> Clone for EventPublisher<C> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            retry: self.retry,
        }
    }
}

impl<C: MessageChannel + ?Sized> EventPublisher<C> {
    pub fn new(channel: Arc<C>, retry: RetryPolicy) -> Self {
        Self { channel, retry }
    }

    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    /// Serializes `payload` and publishes it onto `queue`.
    ///
    /// Returns the last error once transient failures exhaust the retry
    /// budget, or immediately on a permanent failure.
    pub async fn publish<T: Serialize>(&self, queue: &str, kind: &str, payload: &T) -> Result<MessageId> {
        let message = Message::new(kind, payload)?;
        let id = message.id;

        self.retry
            .run("publish", ChannelError::is_transient, || {
                let message = message.clone();
                async move { self.channel.publish(queue, message).await }
            })
            .await?;

        tracing::debug!(queue, kind, message_id = %id, "message published");
        metrics::counter!("messages_published_total", "queue" => queue.to_string()).increment(1);
        Ok(id)
    }
}
