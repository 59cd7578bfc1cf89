//! Inventory ledger.
//!
//! Keeps one stock counter per product and applies decrements at most once
//! per idempotency token. Decrements that take stock below zero are applied
//! anyway and reported as an [`OversoldWarning`].

pub mod error;
pub mod handler;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{InventoryError, Result};
pub use handler::StockUpdateHandler;
pub use ledger::{DecrementOutcome, InventoryLedger, OversoldWarning};
pub use memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use crate::store::{ApplyOutcome, StockStore};
