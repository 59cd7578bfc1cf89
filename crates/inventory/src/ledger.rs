use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde::Serialize;

use common::{IdempotencyToken, ProductId};

use crate::store::{ApplyOutcome, StockStore};
use crate::{InventoryError, Result};

/// Default window during which applied tokens are remembered.
pub const DEFAULT_TOKEN_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Raised when a decrement takes stock below zero.
///
/// The decrement is still applied; the warning lets operators reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OversoldWarning {
    pub product_id: ProductId,
    pub requested: u32,
    pub stock_before: i64,
    pub stock_after: i64,
}

/// Result of [`InventoryLedger::decrement`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecrementOutcome {
    pub product_id: ProductId,
    pub new_stock: i64,
    /// False when the token had already been applied.
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oversold: Option<OversoldWarning>,
}

/// Applies idempotent stock decrements.
pub struct InventoryLedger<S: StockStore + ?Sized> {
    store: Arc<S>,
    token_retention: Duration,
}

impl<S: StockStore + ?Sized> InventoryLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_token_retention(store, DEFAULT_TOKEN_RETENTION)
    }

    pub fn with_token_retention(store: Arc<S>, token_retention: Duration) -> Self {
        Self {
            store,
            token_retention,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Takes `quantity` units out of stock, once per `token`.
    ///
    /// A token seen before returns the current stock without touching it.
    /// Stock may go negative; the outcome then carries an [`OversoldWarning`].
    #[tracing::instrument(skip(self, token), fields(token = %token))]
    pub async fn decrement(
        &self,
        product_id: &ProductId,
        quantity: u32,
        token: &IdempotencyToken,
    ) -> Result<DecrementOutcome> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity);
        }

        let outcome = self
            .store
            .apply_decrement(product_id, quantity, token)
            .await?
            .ok_or_else(|| InventoryError::UnknownProduct(product_id.clone()))?;

        match outcome {
            ApplyOutcome::Duplicate { current } => {
                tracing::info!(%product_id, current, "decrement already applied, skipping");
                metrics::counter!("inventory_decrements_duplicate_total").increment(1);
                Ok(DecrementOutcome {
                    product_id: product_id.clone(),
                    new_stock: current,
                    applied: false,
                    oversold: None,
                })
            }
            ApplyOutcome::Applied { previous, current } => {
                metrics::counter!("inventory_decrements_applied_total").increment(1);
                let oversold = (current < 0).then(|| OversoldWarning {
                    product_id: product_id.clone(),
                    requested: quantity,
                    stock_before: previous,
                    stock_after: current,
                });
                if let Some(warning) = &oversold {
                    tracing::warn!(
                        %product_id,
                        requested = warning.requested,
                        stock_before = warning.stock_before,
                        stock_after = warning.stock_after,
                        "product oversold"
                    );
                    metrics::counter!("inventory_oversold_total").increment(1);
                } else {
                    tracing::info!(%product_id, previous, current, "stock decremented");
                }
                Ok(DecrementOutcome {
                    product_id: product_id.clone(),
                    new_stock: current,
                    applied: true,
                    oversold,
                })
            }
        }
    }

    /// Current stock of a product.
    pub async fn stock(&self, product_id: &ProductId) -> Result<i64> {
        self.store
            .stock(product_id)
            .await?
            .ok_or_else(|| InventoryError::UnknownProduct(product_id.clone()))
    }

    /// Seeds or restocks a product. Only decrements may take stock below zero.
    #[tracing::instrument(skip(self))]
    pub async fn set_stock(&self, product_id: &ProductId, stock: i64) -> Result<()> {
        if stock < 0 {
            return Err(InventoryError::InvalidStock(stock));
        }
        self.store.set_stock(product_id, stock).await?;
        tracing::info!(%product_id, stock, "stock set");
        Ok(())
    }

    /// Forgets tokens older than the retention window.
    pub async fn prune_expired_tokens(&self) -> Result<u64> {
        let Some(cutoff) = TimeDelta::from_std(self.token_retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
        else {
            return Ok(0);
        };
        let removed = self.store.prune_tokens(cutoff).await?;
        if removed > 0 {
            tracing::info!(removed, %cutoff, "expired decrement tokens pruned");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStockStore;
    use common::OrderId;

    async fn ledger_with(product: &str, stock: i64) -> (InventoryLedger<InMemoryStockStore>, ProductId) {
        let store = Arc::new(InMemoryStockStore::new());
        let ledger = InventoryLedger::new(store);
        let product_id = ProductId::new(product);
        ledger.set_stock(&product_id, stock).await.unwrap();
        (ledger, product_id)
    }

    fn token(product_id: &ProductId) -> IdempotencyToken {
        IdempotencyToken::for_stock_decrement(OrderId::new(), 0, product_id)
    }

    #[tokio::test]
    async fn decrement_reduces_stock() {
        let (ledger, p1) = ledger_with("p1", 10).await;

        let outcome = ledger.decrement(&p1, 3, &token(&p1)).await.unwrap();

        assert_eq!(outcome.new_stock, 7);
        assert!(outcome.applied);
        assert!(outcome.oversold.is_none());
        assert_eq!(ledger.stock(&p1).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn same_token_applies_once() {
        let (ledger, p1) = ledger_with("p1", 10).await;
        let token = token(&p1);

        let first = ledger.decrement(&p1, 2, &token).await.unwrap();
        let second = ledger.decrement(&p1, 2, &token).await.unwrap();

        assert!(first.applied);
        assert!(!second.applied);
        assert_eq!(second.new_stock, 8);
        assert_eq!(ledger.stock(&p1).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn oversell_goes_negative_with_warning() {
        let (ledger, p1) = ledger_with("p1", 1).await;

        let outcome = ledger.decrement(&p1, 3, &token(&p1)).await.unwrap();

        assert_eq!(outcome.new_stock, -2);
        assert_eq!(
            outcome.oversold,
            Some(OversoldWarning {
                product_id: p1.clone(),
                requested: 3,
                stock_before: 1,
                stock_after: -2,
            })
        );
    }

    #[tokio::test]
    async fn oversell_is_consistent_across_fresh_tokens() {
        let (ledger, p1) = ledger_with("p1", 1).await;

        let first = ledger.decrement(&p1, 3, &token(&p1)).await.unwrap();
        let second = ledger.decrement(&p1, 3, &token(&p1)).await.unwrap();

        assert_eq!(first.new_stock, -2);
        assert_eq!(second.new_stock, -5);
        assert!(first.oversold.is_some());
        assert_eq!(second.oversold.unwrap().stock_before, -2);
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let (ledger, p1) = ledger_with("p1", 10).await;

        let err = ledger.decrement(&p1, 0, &token(&p1)).await.unwrap_err();

        assert!(matches!(err, InventoryError::InvalidQuantity));
        assert_eq!(ledger.stock(&p1).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn negative_seed_is_rejected() {
        let (ledger, p1) = ledger_with("p1", 4).await;

        let err = ledger.set_stock(&p1, -5).await.unwrap_err();

        assert!(matches!(err, InventoryError::InvalidStock(-5)));
        assert_eq!(ledger.stock(&p1).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn unknown_product_is_rejected() {
        let (ledger, _) = ledger_with("p1", 10).await;
        let ghost = ProductId::new("ghost");

        let err = ledger.decrement(&ghost, 1, &token(&ghost)).await.unwrap_err();

        assert!(matches!(err, InventoryError::UnknownProduct(id) if id == ghost));
    }

    #[tokio::test]
    async fn prune_forgets_only_expired_tokens() {
        let store = Arc::new(InMemoryStockStore::new());
        let ledger = InventoryLedger::with_token_retention(store.clone(), Duration::from_secs(3600));
        let p1 = ProductId::new("p1");
        ledger.set_stock(&p1, 10).await.unwrap();

        let old = token(&p1);
        let fresh = token(&p1);
        ledger.decrement(&p1, 1, &old).await.unwrap();
        ledger.decrement(&p1, 1, &fresh).await.unwrap();
        store
            .backdate_token(&old, Utc::now() - TimeDelta::hours(2))
            .await;

        assert_eq!(ledger.prune_expired_tokens().await.unwrap(), 1);
        assert_eq!(store.token_count().await, 1);
    }
}
