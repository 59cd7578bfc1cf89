//! Queue names, message kinds and the payloads exchanged between services.

use serde::{Deserialize, Serialize};

use common::{IdempotencyToken, OrderId, ProductId};

/// Queue consumed by the inventory ledger.
pub const PRODUCT_STOCK_QUEUE: &str = "product-stock-queue";

/// Queue consumed by the notification dispatcher.
pub const NOTIFICATION_QUEUE: &str = "notification-queue";

/// Kind of [`InventoryDecrement`] messages.
pub const UPDATE_STOCK: &str = "update_stock";

/// Kind of [`NotificationRequest`] messages.
pub const SEND_EMAIL: &str = "send_email";

/// Template announcing a newly created order.
pub const ORDER_CONFIRMATION: &str = "order_confirmation";

/// Template announcing that an order left the warehouse.
pub const SHIPPING_UPDATE: &str = "shipping_update";

/// Request to take `quantity` units of a product out of stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDecrement {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub idempotency_token: IdempotencyToken,
}

/// Request to render and deliver a templated notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub recipient: String,
    /// Overrides the template's subject line when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub template: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub idempotency_token: IdempotencyToken,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decrement_wire_format() {
        let order_id = OrderId::new();
        let product_id = ProductId::new("p1");
        let event = InventoryDecrement {
            order_id,
            product_id: product_id.clone(),
            quantity: 2,
            idempotency_token: IdempotencyToken::for_stock_decrement(order_id, 0, &product_id),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "order_id": order_id.to_string(),
                "product_id": "p1",
                "quantity": 2,
                "idempotency_token": format!("stock:{order_id}:0:p1"),
            })
        );
    }

    #[test]
    fn notification_subject_and_data_are_optional() {
        let request: NotificationRequest = serde_json::from_value(json!({
            "recipient": "user-1",
            "template": "order_confirmation",
            "idempotency_token": "notify:x:order_confirmation",
        }))
        .unwrap();

        assert_eq!(request.subject, None);
        assert!(request.data.is_null());
    }
}
