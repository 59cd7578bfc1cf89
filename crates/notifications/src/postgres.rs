use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use store::{Result, StoreError};

use crate::log::{DeliveryLog, DeliveryRecord, DeliveryStatus};

const RECORD_COLUMNS: &str = "token, recipient, template, subject, channel, status, message_id, \
     error, attempts, data, created_at, updated_at";

/// PostgreSQL-backed delivery log.
#[derive(Clone)]
pub struct PostgresDeliveryLog {
    pool: PgPool,
}

impl PostgresDeliveryLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_record(row: PgRow) -> Result<DeliveryRecord> {
        let status: String = row.try_get("status")?;
        let attempts: i32 = row.try_get("attempts")?;
        Ok(DeliveryRecord {
            token: row.try_get("token")?,
            recipient: row.try_get("recipient")?,
            template: row.try_get("template")?,
            subject: row.try_get("subject")?,
            channel: row.try_get("channel")?,
            status: status.parse::<DeliveryStatus>().map_err(StoreError::Corrupt)?,
            message_id: row.try_get("message_id")?,
            error: row.try_get("error")?,
            attempts: u32::try_from(attempts)
                .map_err(|_| StoreError::Corrupt(format!("negative attempts: {attempts}")))?,
            data: row.try_get("data")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl DeliveryLog for PostgresDeliveryLog {
    async fn get(&self, token: &str) -> Result<Option<DeliveryRecord>> {
        sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM notification_deliveries WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_record)
        .transpose()
    }

    async fn upsert(&self, record: &DeliveryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_deliveries
                (token, recipient, template, subject, channel, status, message_id, error,
                 attempts, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (token) DO UPDATE SET
                subject = EXCLUDED.subject,
                channel = EXCLUDED.channel,
                status = EXCLUDED.status,
                message_id = EXCLUDED.message_id,
                error = EXCLUDED.error,
                attempts = EXCLUDED.attempts,
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            WHERE notification_deliveries.status <> 'sent'
            "#,
        )
        .bind(&record.token)
        .bind(&record.recipient)
        .bind(&record.template)
        .bind(&record.subject)
        .bind(&record.channel)
        .bind(record.status.as_str())
        .bind(&record.message_id)
        .bind(&record.error)
        .bind(i32::try_from(record.attempts).unwrap_or(i32::MAX))
        .bind(&record.data)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, recipient: Option<&str>) -> Result<Vec<DeliveryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM notification_deliveries \
             WHERE ($1::TEXT IS NULL OR recipient = $1) \
             ORDER BY updated_at DESC"
        ))
        .bind(recipient)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }
}
