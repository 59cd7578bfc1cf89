use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{Money, OrderId, PaymentId, UserId};

use crate::{Currency, PaymentMethod, PaymentStatus};

/// A persisted payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub currency: Currency,
    pub method: PaymentMethod,
    /// Identifier of the intent at the provider.
    pub external_reference: String,
    pub status: PaymentStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A newly created payment together with the handle the client needs to
/// complete it at the provider (a client secret or a checkout link).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub client_handle: String,
}
