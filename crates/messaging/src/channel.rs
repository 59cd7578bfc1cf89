use async_trait::async_trait;

use crate::{Delivery, Message, Result};

/// An at-least-once message broker.
///
/// `consume` leases the oldest visible message of a queue. The lease ends
/// with exactly one of `ack` (remove), `nack` (make visible again) or
/// `dead_letter` (park for inspection). A lease that ends with none of them
/// expires and the message is delivered again with a higher attempt count.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Enqueues a message. Publishing an id that is already queued is a no-op.
    async fn publish(&self, queue: &str, message: Message) -> Result<()>;

    /// Leases the next visible message, if any.
    async fn consume(&self, queue: &str) -> Result<Option<Delivery>>;

    /// Removes a handled message.
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Releases the lease so the message is redelivered.
    async fn nack(&self, delivery: &Delivery) -> Result<()>;

    /// Moves the message out of the queue for good.
    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<()>;
}
