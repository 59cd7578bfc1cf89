//! Orders: the record store and the coordinator that starts the
//! fulfillment choreography.
//!
//! Creating an order commits the row first and only then publishes one
//! stock decrement per line and an order confirmation. Downstream services
//! react to those messages on their own; nothing here waits for them.

pub mod coordinator;
pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod status;
pub mod store;

pub use coordinator::OrderCoordinator;
pub use error::{OrderError, Result};
pub use memory::InMemoryOrderStore;
pub use model::{LineItem, Order};
pub use postgres::PostgresOrderStore;
pub use status::OrderStatus;
pub use crate::store::OrderStore;
