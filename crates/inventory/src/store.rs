use async_trait::async_trait;
use chrono::{DateTime, Utc};

use common::{IdempotencyToken, ProductId};
use store::Result;

/// Result of applying a decrement to the stock row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The token was new and the counter moved from `previous` to `current`.
    Applied { previous: i64, current: i64 },
    /// The token was already recorded; nothing changed.
    Duplicate { current: i64 },
}

impl ApplyOutcome {
    pub fn current(&self) -> i64 {
        match self {
            ApplyOutcome::Applied { current, .. } | ApplyOutcome::Duplicate { current } => *current,
        }
    }
}

/// Storage for stock counters and applied decrement tokens.
///
/// `apply_decrement` must record the token and move the counter atomically,
/// so that two concurrent deliveries of one token change stock once.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Applies a decrement unless `token` was applied before.
    ///
    /// Returns `None` if the product has no stock row.
    async fn apply_decrement(
        &self,
        product_id: &ProductId,
        quantity: u32,
        token: &IdempotencyToken,
    ) -> Result<Option<ApplyOutcome>>;

    /// Current stock, or `None` for an unknown product.
    async fn stock(&self, product_id: &ProductId) -> Result<Option<i64>>;

    /// Creates or overwrites the stock counter of a product.
    async fn set_stock(&self, product_id: &ProductId, stock: i64) -> Result<()>;

    /// Forgets tokens applied before `cutoff`. Returns how many were removed.
    async fn prune_tokens(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
