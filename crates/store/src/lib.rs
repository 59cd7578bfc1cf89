//! Storage plumbing shared by every record store.
//!
//! Each service owns its rows and talks to them through its own store trait
//! (`OrderStore`, `PaymentStore`, `StockStore`, `DeliveryLog`). This crate
//! only provides what those implementations have in common: the error type,
//! the Postgres pool and the schema migrations.

pub mod error;
pub mod pool;

pub use error::{Result, StoreError};
pub use pool::{connect, run_migrations};
pub use sqlx::PgPool;
