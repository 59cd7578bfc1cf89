//! Notification dispatcher.
//!
//! Renders a small closed set of email templates, hands the result to an
//! [`EmailSender`] and records every attempt in a delivery log keyed by the
//! request's idempotency token. A token already logged as sent is never
//! sent again.

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod log;
pub mod memory;
pub mod postgres;
pub mod sender;
pub mod template;

pub use dispatcher::{DispatchOutcome, NotificationDispatcher};
pub use error::{NotificationError, Result};
pub use handler::NotificationHandler;
pub use log::{DeliveryLog, DeliveryRecord, DeliveryStatus};
pub use memory::InMemoryDeliveryLog;
pub use postgres::PostgresDeliveryLog;
pub use sender::{EmailSender, InMemoryEmailSender, SendError, SentEmail};
pub use template::{RenderedEmail, render};
