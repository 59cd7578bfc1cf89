//! Payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Money, OrderId, PaymentId, UserId};
use payments::{Payment, PaymentMethod, PaymentReceipt, PaymentRequest, PaymentStatus};
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::parse_id;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub method: String,
    pub currency: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// POST /payments: open a provider intent and record a pending payment.
#[tracing::instrument(skip(state, req), fields(order_id = %req.order_id, method = %req.method))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentReceipt>), ApiError> {
    let order_id: OrderId = parse_id("order", &req.order_id)?;
    let method = req
        .method
        .parse::<PaymentMethod>()
        .map_err(ApiError::BadRequest)?;

    let receipt = state
        .payments
        .create_payment(PaymentRequest {
            order_id,
            user_id: UserId::new(req.user_id),
            amount: Money::from_cents(req.amount_cents),
            method,
            currency: req.currency,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /payments/order/{order_id}
#[tracing::instrument(skip(state))]
pub async fn get_by_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<Payment>, ApiError> {
    let order_id: OrderId = parse_id("order", &order_id)?;
    Ok(Json(state.payments.find_by_order(order_id).await?))
}

/// PUT /payments/{id}/status
#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Payment>, ApiError> {
    let payment_id: PaymentId = parse_id("payment", &id)?;
    let status = req
        .status
        .parse::<PaymentStatus>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(state.payments.update_status(payment_id, status).await?))
}
