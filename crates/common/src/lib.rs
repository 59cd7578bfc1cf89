//! Shared types for the order-fulfillment services.
//!
//! Every service crate depends on this one for identifiers that cross
//! process boundaries (they travel inside queue messages and HTTP bodies),
//! for the [`Money`] value object and for the [`RetryPolicy`] used at
//! infrastructure boundaries.

pub mod money;
pub mod retry;
pub mod token;
pub mod types;

pub use money::Money;
pub use retry::RetryPolicy;
pub use token::IdempotencyToken;
pub use types::{OrderId, PaymentId, ProductId, UserId};
