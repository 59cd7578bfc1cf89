use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use common::{IdempotencyToken, ProductId};
use store::Result;

use crate::store::{ApplyOutcome, StockStore};

/// PostgreSQL-backed stock store.
#[derive(Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn apply_decrement(
        &self,
        product_id: &ProductId,
        quantity: u32,
        token: &IdempotencyToken,
    ) -> Result<Option<ApplyOutcome>> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes decrements of one product.
        let previous: Option<i64> =
            sqlx::query_scalar("SELECT stock FROM product_stock WHERE product_id = $1 FOR UPDATE")
                .bind(product_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        let Some(previous) = previous else {
            tx.rollback().await?;
            return Ok(None);
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO applied_decrements (token, product_id, quantity, applied_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (token) DO NOTHING
            "#,
        )
        .bind(token.as_str())
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.commit().await?;
            return Ok(Some(ApplyOutcome::Duplicate { current: previous }));
        }

        let current: i64 = sqlx::query_scalar(
            r#"
            UPDATE product_stock
            SET stock = stock - $2, updated_at = NOW()
            WHERE product_id = $1
            RETURNING stock
            "#,
        )
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(ApplyOutcome::Applied { previous, current }))
    }

    async fn stock(&self, product_id: &ProductId) -> Result<Option<i64>> {
        let stock = sqlx::query_scalar("SELECT stock FROM product_stock WHERE product_id = $1")
            .bind(product_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(stock)
    }

    async fn set_stock(&self, product_id: &ProductId, stock: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO product_stock (product_id, stock, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (product_id) DO UPDATE SET stock = EXCLUDED.stock, updated_at = NOW()
            "#,
        )
        .bind(product_id.as_str())
        .bind(stock)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn prune_tokens(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM applied_decrements WHERE applied_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
