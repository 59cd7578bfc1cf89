use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{Money, OrderId, ProductId, UserId};

use crate::{OrderError, OrderStatus, Result};

/// One product line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price per unit at the time the order was placed.
    pub unit_price: Money,
}

impl LineItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    /// Sum of unit price times quantity, fixed at creation.
    pub total_amount: Money,
    pub shipping_address: String,
    pub status: OrderStatus,
    /// Incremented on every status change; used for optimistic locking.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Validates the input and builds a new order in `CREATED`.
    pub fn new(user_id: UserId, items: Vec<LineItem>, shipping_address: String) -> Result<Self> {
        if user_id.is_blank() {
            return Err(OrderError::InvalidOrder("user id is required".to_string()));
        }
        if items.is_empty() {
            return Err(OrderError::InvalidOrder(
                "order must contain at least one item".to_string(),
            ));
        }

        let mut total = Money::zero();
        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidOrder(format!(
                    "quantity for product {} must be at least 1",
                    item.product_id
                )));
            }
            if item.unit_price.is_negative() {
                return Err(OrderError::InvalidOrder(format!(
                    "price for product {} must not be negative",
                    item.product_id
                )));
            }
            total = item
                .unit_price
                .checked_mul(item.quantity)
                .and_then(|line| total.checked_add(line))
                .ok_or_else(|| OrderError::InvalidOrder("order total overflows".to_string()))?;
        }

        let now = Utc::now();
        Ok(Self {
            id: OrderId::new(),
            user_id,
            items,
            total_amount: total,
            shipping_address,
            status: OrderStatus::Created,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }
}
