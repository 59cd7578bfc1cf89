use async_trait::async_trait;

use common::{OrderId, PaymentId};
use store::Result;

use crate::{Payment, PaymentStatus};

/// Persistence for payments.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a payment. Fails with `StoreError::Duplicate` if the order
    /// already has one.
    async fn insert(&self, payment: &Payment) -> Result<()>;

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Payment>>;

    /// Sets the status if the stored version still equals `expected_version`.
    async fn update_status(
        &self,
        id: PaymentId,
        expected_version: i64,
        status: PaymentStatus,
    ) -> Result<Payment>;
}
