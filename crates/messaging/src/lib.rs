//! At-least-once messaging between the fulfillment services.
//!
//! Producers publish fire-and-forget messages onto named queues through an
//! [`EventPublisher`]; consumers lease messages with [`Consumer`] workers and
//! acknowledge them once handled. A leased message that is never
//! acknowledged becomes visible again after its lease expires, so every
//! handler must tolerate seeing the same message more than once. The
//! payloads carry an [`common::IdempotencyToken`] for exactly that purpose.

pub mod channel;
pub mod consumer;
pub mod contracts;
pub mod error;
pub mod memory;
pub mod message;
pub mod postgres;
pub mod publisher;

pub use channel::MessageChannel;
pub use consumer::{Consumer, ConsumerConfig, HandlerError, MessageHandler, ProcessOutcome};
pub use contracts::{
    InventoryDecrement, NOTIFICATION_QUEUE, NotificationRequest, ORDER_CONFIRMATION,
    PRODUCT_STOCK_QUEUE, SEND_EMAIL, SHIPPING_UPDATE, UPDATE_STOCK,
};
pub use error::{ChannelError, Result};
pub use memory::InMemoryMessageChannel;
pub use message::{Delivery, LeaseId, Message, MessageId};
pub use postgres::PostgresMessageChannel;
pub use publisher::EventPublisher;
