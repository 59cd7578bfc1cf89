use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::{Money, OrderId, PaymentId, UserId};
use store::{Result, StoreError};

use crate::store::PaymentStore;
use crate::{Currency, Payment, PaymentMethod, PaymentStatus};

const PAYMENT_COLUMNS: &str = "id, order_id, user_id, amount_cents, currency, method, \
     external_reference, status, version, created_at, updated_at";

/// PostgreSQL-backed payment store.
#[derive(Clone)]
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        let currency: String = row.try_get("currency")?;
        let method: String = row.try_get("method")?;
        let status: String = row.try_get("status")?;

        Ok(Payment {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            currency: Currency::parse(&currency)
                .ok_or_else(|| StoreError::Corrupt(format!("bad currency: {currency}")))?,
            method: method.parse::<PaymentMethod>().map_err(StoreError::Corrupt)?,
            external_reference: row.try_get("external_reference")?,
            status: status
                .parse::<PaymentStatus>()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn insert(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, user_id, amount_cents, currency, method,
                                  external_reference, status, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.user_id.as_str())
        .bind(payment.amount.cents())
        .bind(payment.currency.as_str())
        .bind(payment.method.as_str())
        .bind(&payment.external_reference)
        .bind(payment.status.as_str())
        .bind(payment.version)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if store::error::is_unique_violation(&e, "unique_payment_order") {
                return StoreError::Duplicate {
                    entity: "payment",
                    key: payment.order_id.to_string(),
                };
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        sqlx::query(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_payment)
            .transpose()
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_payment)
        .transpose()
    }

    async fn update_status(
        &self,
        id: PaymentId,
        expected_version: i64,
        status: PaymentStatus,
    ) -> Result<Payment> {
        let row = sqlx::query(&format!(
            "UPDATE payments \
             SET status = $3, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(expected_version)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Self::row_to_payment(row);
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM payments WHERE id = $1)")
                .bind(id.as_uuid())
                .fetch_one(&self.pool)
                .await?;
        Err(if exists {
            StoreError::Conflict {
                entity: "payment",
                id: id.to_string(),
                expected: expected_version,
            }
        } else {
            StoreError::NotFound {
                entity: "payment",
                id: id.to_string(),
            }
        })
    }
}
