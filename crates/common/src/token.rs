//! Idempotency tokens carried by queue messages.

use serde::{Deserialize, Serialize};

use crate::{OrderId, ProductId};

/// Deterministic key identifying one logical operation.
///
/// Consumers record the tokens they have applied so a redelivered message
/// is recognised and its effect suppressed. A token must be derived from
/// the originating order, never generated per attempt, so that retries and
/// redeliveries carry the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyToken(String);

impl IdempotencyToken {
    /// Wraps an externally supplied token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token for the stock decrement of one order line.
    ///
    /// The line index keeps tokens distinct when an order carries two lines
    /// for the same product.
    pub fn for_stock_decrement(order_id: OrderId, line_index: usize, product_id: &ProductId) -> Self {
        Self(format!("stock:{order_id}:{line_index}:{product_id}"))
    }

    /// Token for a templated notification about an order.
    pub fn for_notification(order_id: OrderId, template: &str) -> Self {
        Self(format!("notify:{order_id}:{template}"))
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_token_is_deterministic() {
        let order_id = OrderId::new();
        let product = ProductId::new("p1");
        assert_eq!(
            IdempotencyToken::for_stock_decrement(order_id, 0, &product),
            IdempotencyToken::for_stock_decrement(order_id, 0, &product)
        );
    }

    #[test]
    fn stock_token_differs_per_line() {
        let order_id = OrderId::new();
        let product = ProductId::new("p1");
        assert_ne!(
            IdempotencyToken::for_stock_decrement(order_id, 0, &product),
            IdempotencyToken::for_stock_decrement(order_id, 1, &product)
        );
    }

    #[test]
    fn notification_token_includes_template() {
        let order_id = OrderId::new();
        let token = IdempotencyToken::for_notification(order_id, "order_confirmation");
        assert_eq!(token.as_str(), format!("notify:{order_id}:order_confirmation"));
    }
}
