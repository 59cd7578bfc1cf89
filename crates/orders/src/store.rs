use async_trait::async_trait;

use common::{OrderId, UserId};
use store::Result;

use crate::{Order, OrderStatus};

/// Persistence for orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order with its line items.
    async fn insert(&self, order: &Order) -> Result<()>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists orders, newest first, optionally for a single user.
    async fn list(&self, user_id: Option<&UserId>) -> Result<Vec<Order>>;

    /// Sets the status if the stored version still equals `expected_version`.
    ///
    /// Fails with `StoreError::Conflict` when the row moved on and with
    /// `StoreError::NotFound` when it does not exist. Returns the updated order.
    async fn update_status(
        &self,
        id: OrderId,
        expected_version: i64,
        status: OrderStatus,
    ) -> Result<Order>;
}
