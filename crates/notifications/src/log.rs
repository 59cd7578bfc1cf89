//! Delivery log records and storage trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use store::Result;

/// Final state of the latest delivery attempt for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(format!("unknown delivery status: {other}")),
        }
    }
}

/// One entry of the delivery log, keyed by idempotency token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub token: String,
    pub recipient: String,
    pub template: String,
    pub subject: String,
    pub channel: String,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of delivery attempts made for this token.
    pub attempts: u32,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage for delivery records.
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    async fn get(&self, token: &str) -> Result<Option<DeliveryRecord>>;

    /// Inserts the record or replaces the one with the same token.
    ///
    /// A record already logged as sent is never replaced.
    async fn upsert(&self, record: &DeliveryRecord) -> Result<()>;

    /// Lists records, most recently updated first.
    async fn list(&self, recipient: Option<&str>) -> Result<Vec<DeliveryRecord>>;
}
