use thiserror::Error;

use common::OrderId;
use messaging::ChannelError;
use store::StoreError;

use crate::OrderStatus;

/// Errors that can occur in order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order failed validation and nothing was persisted.
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order not found: {0}")]
    NotFound(OrderId),

    #[error("Order {order_id} has not shipped (status {status})")]
    ShippingNotAllowed {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// An explicitly requested notification could not be published.
    #[error("Failed to publish: {0}")]
    Publish(#[from] ChannelError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, OrderError>;
