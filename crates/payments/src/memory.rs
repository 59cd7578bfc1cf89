use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use common::{OrderId, PaymentId};
use store::{Result, StoreError};

use crate::store::PaymentStore;
use crate::{Payment, PaymentStatus};

#[derive(Debug, Default)]
struct State {
    payments: HashMap<PaymentId, Payment>,
    by_order: HashMap<OrderId, PaymentId>,
}

/// In-memory payment store with the same one-payment-per-order rule as
/// the Postgres table.
#[derive(Clone, Default)]
pub struct InMemoryPaymentStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.payments.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.payments.is_empty()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: &Payment) -> Result<()> {
        let mut state = self.state.write().await;
        if state.by_order.contains_key(&payment.order_id) {
            return Err(StoreError::Duplicate {
                entity: "payment",
                key: payment.order_id.to_string(),
            });
        }
        state.by_order.insert(payment.order_id, payment.id);
        state.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.state.read().await.payments.get(&id).cloned())
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .by_order
            .get(&order_id)
            .and_then(|id| state.payments.get(id))
            .cloned())
    }

    async fn update_status(
        &self,
        id: PaymentId,
        expected_version: i64,
        status: PaymentStatus,
    ) -> Result<Payment> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "payment",
                id: id.to_string(),
            })?;

        if payment.version != expected_version {
            return Err(StoreError::Conflict {
                entity: "payment",
                id: id.to_string(),
                expected: expected_version,
            });
        }

        payment.status = status;
        payment.version += 1;
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }
}
