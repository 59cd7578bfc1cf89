//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Money, OrderId, UserId};
use orders::{LineItem, Order, OrderStatus};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::parse_id;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: String,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct ShippingNotificationRequest {
    pub tracking_number: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct ShippingNotificationResponse {
    pub order_id: String,
    pub tracking_number: String,
    pub queued: bool,
}

// -- Handlers --

/// POST /orders: validate and persist an order, then start fulfillment.
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let items = req
        .items
        .into_iter()
        .map(|item| {
            LineItem::new(
                item.product_id,
                item.quantity,
                Money::from_cents(item.unit_price_cents),
            )
        })
        .collect();

    let order = state
        .orders
        .create_order(UserId::new(req.user_id), items, req.shipping_address)
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    Ok(Json(state.orders.get_order(order_id).await?))
}

/// GET /orders?user_id=: newest first.
#[tracing::instrument(skip(state, query))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let user_id = query.user_id.map(UserId::new);
    Ok(Json(state.orders.list_orders(user_id.as_ref()).await?))
}

/// PUT /orders/{id}/status
#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let status = req
        .status
        .parse::<OrderStatus>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(state.orders.update_status(order_id, status).await?))
}

/// POST /orders/{id}/shipping-notification: queue a shipping update email.
#[tracing::instrument(skip(state, req))]
pub async fn notify_shipping(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ShippingNotificationRequest>,
) -> Result<(StatusCode, Json<ShippingNotificationResponse>), ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let tracking_number = req.tracking_number.trim();
    if tracking_number.is_empty() {
        return Err(ApiError::BadRequest(
            "tracking_number is required".to_string(),
        ));
    }

    state
        .orders
        .notify_shipping(order_id, tracking_number)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ShippingNotificationResponse {
            order_id: order_id.to_string(),
            tracking_number: tracking_number.to_string(),
            queued: true,
        }),
    ))
}
