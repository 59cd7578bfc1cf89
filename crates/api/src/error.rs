//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory::InventoryError;
use notifications::NotificationError;
use orders::OrderError;
use payments::PaymentError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    Order(OrderError),
    Payment(PaymentError),
    Inventory(InventoryError),
    Notification(NotificationError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Order(err) => order_error_to_response(err),
            ApiError::Payment(err) => payment_error_to_response(err),
            ApiError::Inventory(err) => inventory_error_to_response(err),
            ApiError::Notification(NotificationError::Store(err)) => store_error_to_response(err),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn order_error_to_response(err: OrderError) -> (StatusCode, String) {
    match err {
        OrderError::InvalidOrder(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        OrderError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        OrderError::InvalidTransition { .. } | OrderError::ShippingNotAllowed { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        OrderError::Publish(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        OrderError::Store(e) => store_error_to_response(e),
    }
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, String) {
    match err {
        PaymentError::InvalidRequest(_) | PaymentError::UnsupportedMethod(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        PaymentError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        PaymentError::DuplicatePayment(_) | PaymentError::InvalidTransition { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        PaymentError::Provider(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        PaymentError::Store(e) => store_error_to_response(e),
    }
}

fn inventory_error_to_response(err: InventoryError) -> (StatusCode, String) {
    match err {
        InventoryError::InvalidQuantity | InventoryError::InvalidStock(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        InventoryError::UnknownProduct(_) => (StatusCode::NOT_FOUND, err.to_string()),
        InventoryError::Store(e) => store_error_to_response(e),
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match err {
        StoreError::Conflict { .. } | StoreError::Duplicate { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        ApiError::Inventory(err)
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        ApiError::Notification(err)
    }
}
