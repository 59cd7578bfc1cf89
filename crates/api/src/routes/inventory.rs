//! Stock endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SetStockRequest {
    pub stock: i64,
}

#[derive(Serialize)]
pub struct StockResponse {
    pub product_id: ProductId,
    pub stock: i64,
}

/// GET /inventory/{product_id}: current stock, which may be negative.
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
) -> Result<Json<StockResponse>, ApiError> {
    let product_id = ProductId::new(product_id);
    let stock = state.inventory.stock(&product_id).await?;
    Ok(Json(StockResponse { product_id, stock }))
}

/// PUT /inventory/{product_id}: seed or restock a product.
#[tracing::instrument(skip(state, req), fields(stock = req.stock))]
pub async fn set(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    Json(req): Json<SetStockRequest>,
) -> Result<Json<StockResponse>, ApiError> {
    let product_id = ProductId::new(product_id);
    if product_id.as_str().trim().is_empty() {
        return Err(ApiError::BadRequest("product id is required".to_string()));
    }
    state.inventory.set_stock(&product_id, req.stock).await?;
    Ok(Json(StockResponse {
        product_id,
        stock: req.stock,
    }))
}
