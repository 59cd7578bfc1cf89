use thiserror::Error;

use store::StoreError;

/// Errors returned by the dispatcher.
///
/// Delivery failures are not errors; they are reported through
/// [`crate::DispatchOutcome::Failed`].
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, NotificationError>;
