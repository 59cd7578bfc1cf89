use std::sync::Arc;

use serde_json::json;

use common::{IdempotencyToken, OrderId, UserId};
use messaging::{
    EventPublisher, InventoryDecrement, MessageChannel, NOTIFICATION_QUEUE, NotificationRequest,
    ORDER_CONFIRMATION, PRODUCT_STOCK_QUEUE, SEND_EMAIL, SHIPPING_UPDATE, UPDATE_STOCK,
};
use store::StoreError;

use crate::store::OrderStore;
use crate::{LineItem, Order, OrderError, OrderStatus, Result};

const DEFAULT_UPDATE_ATTEMPTS: u32 = 3;

/// Creates orders and starts the fulfillment choreography.
///
/// The coordinator owns the order rows. Everything else happens in other
/// services, driven by the messages it publishes after each commit.
pub struct OrderCoordinator<S: OrderStore + ?Sized, C: MessageChannel + ?Sized> {
    store: Arc<S>,
    publisher: EventPublisher<C>,
    update_attempts: u32,
}

impl<S: OrderStore + ?Sized, C: MessageChannel + ?Sized> OrderCoordinator<S, C> {
    pub fn new(store: Arc<S>, publisher: EventPublisher<C>) -> Self {
        Self {
            store,
            publisher,
            update_attempts: DEFAULT_UPDATE_ATTEMPTS,
        }
    }

    /// Sets how many times a status update is re-validated after a version conflict.
    pub fn with_update_attempts(mut self, attempts: u32) -> Self {
        self.update_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Validates and persists a new order, then publishes its follow-up events.
    ///
    /// A publish failure after the commit is logged and counted but does not
    /// fail the call: the order exists either way.
    #[tracing::instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        items: Vec<LineItem>,
        shipping_address: String,
    ) -> Result<Order> {
        let order = Order::new(user_id, items, shipping_address)?;
        self.store.insert(&order).await?;

        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            total = %order.total_amount,
            "order created"
        );
        metrics::counter!("orders_created_total").increment(1);

        self.emit_follow_ups(&order).await;
        Ok(order)
    }

    async fn emit_follow_ups(&self, order: &Order) {
        for (index, item) in order.items.iter().enumerate() {
            let event = InventoryDecrement {
                order_id: order.id,
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                idempotency_token: IdempotencyToken::for_stock_decrement(
                    order.id,
                    index,
                    &item.product_id,
                ),
            };
            self.emit(order.id, PRODUCT_STOCK_QUEUE, UPDATE_STOCK, &event)
                .await;
        }

        let confirmation = NotificationRequest {
            recipient: order.user_id.to_string(),
            subject: None,
            template: ORDER_CONFIRMATION.to_string(),
            data: json!({
                "order_id": order.id.to_string(),
                "total_amount": order.total_amount.to_string(),
            }),
            idempotency_token: IdempotencyToken::for_notification(order.id, ORDER_CONFIRMATION),
        };
        self.emit(order.id, NOTIFICATION_QUEUE, SEND_EMAIL, &confirmation)
            .await;
    }

    async fn emit<T: serde::Serialize + Sync>(
        &self,
        order_id: OrderId,
        queue: &'static str,
        kind: &'static str,
        payload: &T,
    ) {
        match self.publisher.publish(queue, kind, payload).await {
            Ok(_) => {
                metrics::counter!("order_events_emitted_total", "kind" => kind).increment(1);
            }
            Err(e) => {
                tracing::error!(%order_id, queue, kind, error = %e, "failed to publish order event");
                metrics::counter!("order_event_emission_failures_total", "kind" => kind)
                    .increment(1);
            }
        }
    }

    /// Moves an order to `new_status` if the lifecycle allows it.
    ///
    /// On a concurrent update the order is reloaded and the transition is
    /// checked again against the fresh status.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<Order> {
        let mut attempt = 1;
        loop {
            let order = self.get_order(order_id).await?;
            if !order.status.can_transition_to(new_status) {
                return Err(OrderError::InvalidTransition {
                    from: order.status,
                    to: new_status,
                });
            }

            match self
                .store
                .update_status(order_id, order.version, new_status)
                .await
            {
                Ok(updated) => {
                    tracing::info!(%order_id, from = %order.status, to = %new_status, "order status updated");
                    return Ok(updated);
                }
                Err(StoreError::Conflict { .. }) if attempt < self.update_attempts => {
                    tracing::debug!(%order_id, attempt, "version conflict, reloading order");
                    attempt += 1;
                }
                Err(StoreError::NotFound { .. }) => return Err(OrderError::NotFound(order_id)),
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))
    }

    /// Lists orders newest first, optionally only those of one user.
    pub async fn list_orders(&self, user_id: Option<&UserId>) -> Result<Vec<Order>> {
        Ok(self.store.list(user_id).await?)
    }

    /// Publishes a `shipping_update` notification for a shipped order.
    #[tracing::instrument(skip(self))]
    pub async fn notify_shipping(&self, order_id: OrderId, tracking_number: &str) -> Result<()> {
        let order = self.get_order(order_id).await?;
        if !order.status.has_shipped() {
            return Err(OrderError::ShippingNotAllowed {
                order_id,
                status: order.status,
            });
        }

        let request = NotificationRequest {
            recipient: order.user_id.to_string(),
            subject: None,
            template: SHIPPING_UPDATE.to_string(),
            data: json!({
                "order_id": order_id.to_string(),
                "tracking_number": tracking_number,
            }),
            idempotency_token: IdempotencyToken::for_notification(order_id, SHIPPING_UPDATE),
        };
        self.publisher
            .publish(NOTIFICATION_QUEUE, SEND_EMAIL, &request)
            .await?;

        tracing::info!(%order_id, tracking_number, "shipping notification requested");
        metrics::counter!("order_events_emitted_total", "kind" => SEND_EMAIL).increment(1);
        Ok(())
    }
}
