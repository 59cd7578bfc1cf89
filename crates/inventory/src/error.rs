use thiserror::Error;

use common::ProductId;
use store::StoreError;

/// Errors that can occur when changing stock.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Stock must not be negative, got {0}")]
    InvalidStock(i64),

    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, InventoryError>;
