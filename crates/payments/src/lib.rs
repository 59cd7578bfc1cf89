//! Payments: the record store and the initiator that opens payment intents
//! with an external provider.
//!
//! At most one payment exists per order. The initiator refuses a second one
//! before calling the provider, and the store enforces the same rule with a
//! unique constraint for the race between two concurrent requests.

pub mod error;
pub mod initiator;
pub mod memory;
pub mod method;
pub mod model;
pub mod postgres;
pub mod provider;
pub mod status;
pub mod store;

pub use error::{PaymentError, Result};
pub use initiator::{PaymentInitiator, PaymentRequest};
pub use memory::InMemoryPaymentStore;
pub use method::{Currency, PaymentMethod};
pub use model::{Payment, PaymentReceipt};
pub use postgres::PostgresPaymentStore;
pub use provider::{
    InMemoryPaymentProvider, PaymentIntent, PaymentProvider, ProviderError, ProviderRegistry,
};
pub use status::PaymentStatus;
pub use crate::store::PaymentStore;
