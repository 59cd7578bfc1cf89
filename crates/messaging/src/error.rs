use thiserror::Error;

use store::StoreError;

use crate::MessageId;

/// Errors raised by a message channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The broker cannot be reached right now.
    #[error("Message channel unavailable: {0}")]
    Unavailable(String),

    /// A payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The delivery was already settled or its lease expired and the message
    /// was handed to another consumer.
    #[error("Unknown or expired delivery of message {message_id} on {queue}")]
    UnknownDelivery { queue: String, message_id: MessageId },

    /// The durable queue table failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ChannelError {
    /// Returns true if the same call may succeed when retried.
    pub fn is_transient(&self) -> bool {
        match self {
            ChannelError::Unavailable(_) => true,
            ChannelError::Store(e) => e.is_transient(),
            ChannelError::Serialization(_) | ChannelError::UnknownDelivery { .. } => false,
        }
    }
}

impl From<sqlx::Error> for ChannelError {
    fn from(e: sqlx::Error) -> Self {
        ChannelError::Store(StoreError::Database(e))
    }
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;
