use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use common::{OrderId, UserId};
use store::{Result, StoreError};

use crate::store::OrderStore;
use crate::{Order, OrderStatus};

/// In-memory order store.
///
/// Orders are kept in insertion order, which makes "newest first" listing
/// deterministic even for orders created within the same clock tick.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<Vec<Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.iter().any(|o| o.id == order.id) {
            return Err(StoreError::Duplicate {
                entity: "order",
                key: order.id.to_string(),
            });
        }
        orders.push(order.clone());
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.iter().find(|o| o.id == id).cloned())
    }

    async fn list(&self, user_id: Option<&UserId>) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .rev()
            .filter(|o| user_id.is_none_or(|user| &o.user_id == user))
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: OrderId,
        expected_version: i64,
        status: OrderStatus,
    ) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "order",
                id: id.to_string(),
            })?;

        if order.version != expected_version {
            return Err(StoreError::Conflict {
                entity: "order",
                id: id.to_string(),
                expected: expected_version,
            });
        }

        order.status = status;
        order.version += 1;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}
