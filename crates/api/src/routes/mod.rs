//! HTTP route handlers, one module per service.

pub mod health;
pub mod inventory;
pub mod metrics;
pub mod notifications;
pub mod orders;
pub mod payments;

use crate::error::ApiError;

/// Parses an identifier taken from the request path.
pub(crate) fn parse_id<T: std::str::FromStr>(kind: &str, raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {kind} id: {raw}")))
}
