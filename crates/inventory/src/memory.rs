use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use common::{IdempotencyToken, ProductId};
use store::{Result, StoreError};

use crate::store::{ApplyOutcome, StockStore};

#[derive(Debug, Default)]
struct State {
    stock: HashMap<ProductId, i64>,
    applied: HashMap<IdempotencyToken, DateTime<Utc>>,
}

/// In-memory stock store.
///
/// A single write lock covers the token check and the counter update, which
/// gives the same atomicity as the Postgres transaction.
#[derive(Clone, Default)]
pub struct InMemoryStockStore {
    state: Arc<RwLock<State>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with a transient database error (for testing).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of tokens currently remembered.
    pub async fn token_count(&self) -> usize {
        self.state.read().await.applied.len()
    }

    /// Records `token` as applied at `at`, for exercising retention.
    pub async fn backdate_token(&self, token: &IdempotencyToken, at: DateTime<Utc>) {
        if let Some(applied_at) = self.state.write().await.applied.get_mut(token) {
            *applied_at = at;
        }
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn apply_decrement(
        &self,
        product_id: &ProductId,
        quantity: u32,
        token: &IdempotencyToken,
    ) -> Result<Option<ApplyOutcome>> {
        self.check()?;
        let mut state = self.state.write().await;
        let Some(&previous) = state.stock.get(product_id) else {
            return Ok(None);
        };
        if state.applied.contains_key(token) {
            return Ok(Some(ApplyOutcome::Duplicate { current: previous }));
        }

        let current = previous.checked_sub(i64::from(quantity)).ok_or_else(|| {
            StoreError::Corrupt(format!("stock of product {product_id} out of range"))
        })?;
        state.stock.insert(product_id.clone(), current);
        state.applied.insert(token.clone(), Utc::now());
        Ok(Some(ApplyOutcome::Applied { previous, current }))
    }

    async fn stock(&self, product_id: &ProductId) -> Result<Option<i64>> {
        self.check()?;
        Ok(self.state.read().await.stock.get(product_id).copied())
    }

    async fn set_stock(&self, product_id: &ProductId, stock: i64) -> Result<()> {
        self.check()?;
        self.state
            .write()
            .await
            .stock
            .insert(product_id.clone(), stock);
        Ok(())
    }

    async fn prune_tokens(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.check()?;
        let mut state = self.state.write().await;
        let before = state.applied.len();
        state.applied.retain(|_, applied_at| *applied_at >= cutoff);
        Ok((before - state.applied.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;

    #[tokio::test]
    async fn decrement_past_range_is_an_error() {
        let store = InMemoryStockStore::new();
        let p1 = ProductId::new("p1");
        store.set_stock(&p1, i64::MIN).await.unwrap();
        let token = IdempotencyToken::for_stock_decrement(OrderId::new(), 0, &p1);

        let err = store.apply_decrement(&p1, 1, &token).await.unwrap_err();

        assert!(matches!(err, StoreError::Corrupt(_)));
        assert!(!err.is_transient());
        assert_eq!(store.stock(&p1).await.unwrap(), Some(i64::MIN));
        assert_eq!(store.token_count().await, 0);
    }
}
