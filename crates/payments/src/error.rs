use thiserror::Error;

use common::OrderId;
use store::StoreError;

use crate::{PaymentMethod, PaymentStatus, ProviderError};

/// Errors that can occur in payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),

    #[error("No provider configured for payment method {0}")]
    UnsupportedMethod(PaymentMethod),

    #[error("A payment already exists for order {0}")]
    DuplicatePayment(OrderId),

    /// The provider refused, failed or timed out. No payment was recorded.
    #[error("Payment provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Cannot move payment from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Payment not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, PaymentError>;
