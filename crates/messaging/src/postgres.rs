use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{ChannelError, Delivery, LeaseId, Message, MessageChannel, MessageId, Result};

/// Durable message channel backed by the `queue_messages` table.
///
/// Consumers lease rows with `FOR UPDATE SKIP LOCKED`, so any number of
/// workers across processes can poll the same queue without handing one
/// message to two of them at once.
#[derive(Clone)]
pub struct PostgresMessageChannel {
    pool: PgPool,
    lease_timeout: Duration,
}

impl PostgresMessageChannel {
    pub fn new(pool: PgPool, lease_timeout: Duration) -> Self {
        Self {
            pool,
            lease_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Number of dead-lettered messages on `queue`.
    pub async fn dead_letter_count(&self, queue: &str) -> Result<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM queue_messages WHERE queue = $1 AND status = 'dead'",
        )
        .bind(queue)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    fn row_to_delivery(queue: &str, row: PgRow) -> Result<Delivery> {
        let attempts: i32 = row.try_get("attempts")?;
        Ok(Delivery {
            queue: queue.to_string(),
            message: Message {
                id: MessageId::from_uuid(row.try_get::<Uuid, _>("id")?),
                kind: row.try_get("kind")?,
                payload: row.try_get("payload")?,
                published_at: row.try_get::<DateTime<Utc>, _>("published_at")?,
            },
            attempt: u32::try_from(attempts).unwrap_or(u32::MAX),
            lease: LeaseId::from_uuid(row.try_get::<Uuid, _>("lease_id")?),
        })
    }

    fn unknown(delivery: &Delivery) -> ChannelError {
        ChannelError::UnknownDelivery {
            queue: delivery.queue.clone(),
            message_id: delivery.message.id,
        }
    }
}

#[async_trait]
impl MessageChannel for PostgresMessageChannel {
    async fn publish(&self, queue: &str, message: Message) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO queue_messages (id, queue, kind, payload, published_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(message.id.as_uuid())
        .bind(queue)
        .bind(&message.kind)
        .bind(&message.payload)
        .bind(message.published_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<Option<Delivery>> {
        let row = sqlx::query(
            r#"
            UPDATE queue_messages
            SET status = 'leased',
                attempts = attempts + 1,
                lease_id = $2,
                leased_until = NOW() + make_interval(secs => $3)
            WHERE id = (
                SELECT id FROM queue_messages
                WHERE queue = $1
                  AND (status = 'ready' OR (status = 'leased' AND leased_until < NOW()))
                ORDER BY seq
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, kind, payload, published_at, attempts, lease_id
            "#,
        )
        .bind(queue)
        .bind(Uuid::new_v4())
        .bind(self.lease_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_delivery(queue, row)).transpose()
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM queue_messages WHERE id = $1 AND lease_id = $2 AND status = 'leased'",
        )
        .bind(delivery.message.id.as_uuid())
        .bind(delivery.lease.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::unknown(delivery));
        }
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE queue_messages
            SET status = 'ready', lease_id = NULL, leased_until = NULL
            WHERE id = $1 AND lease_id = $2 AND status = 'leased'
            "#,
        )
        .bind(delivery.message.id.as_uuid())
        .bind(delivery.lease.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::unknown(delivery));
        }
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE queue_messages
            SET status = 'dead', dead_reason = $3, leased_until = NULL
            WHERE id = $1 AND lease_id = $2 AND status = 'leased'
            "#,
        )
        .bind(delivery.message.id.as_uuid())
        .bind(delivery.lease.as_uuid())
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::unknown(delivery));
        }
        Ok(())
    }
}
