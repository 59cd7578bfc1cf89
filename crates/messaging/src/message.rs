//! Message envelope and delivery types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// Identifier of a published message.
///
/// Assigned once before the first publish attempt. Publishing the same id
/// twice is a no-op on both channel implementations, so a retried publish
/// cannot enqueue a second copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one lease on a message.
///
/// A message redelivered after lease expiry gets a fresh lease id, which
/// lets the channel reject a late ack from the consumer that lost it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseId(Uuid);

impl LeaseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LeaseId {
    fn default() -> Self {
        Self::new()
    }
}

/// A message as it travels through a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// Routing pattern, e.g. `update_stock`.
    pub kind: String,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

impl Message {
    /// Serializes `payload` into a new message with a fresh id.
    pub fn new<T: Serialize>(kind: impl Into<String>, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            id: MessageId::new(),
            kind: kind.into(),
            payload: serde_json::to_value(payload)?,
            published_at: Utc::now(),
        })
    }

    /// Decodes the payload into a typed contract.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.payload.clone())
    }
}

/// A leased message handed to a consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub queue: String,
    pub message: Message,
    /// 1 on first delivery, incremented on every redelivery.
    pub attempt: u32,
    pub lease: LeaseId,
}
