use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::{Money, OrderId, ProductId, UserId};
use store::{Result, StoreError};

use crate::store::OrderStore;
use crate::{LineItem, Order, OrderStatus};

const ORDER_COLUMNS: &str =
    "id, user_id, total_cents, shipping_address, status, version, created_at, updated_at";

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_order(row: &PgRow, items: Vec<LineItem>) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            items,
            total_amount: Money::from_cents(row.try_get("total_cents")?),
            shipping_address: row.try_get("shipping_address")?,
            status,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<LineItem> {
        let quantity: i64 = row.try_get("quantity")?;
        Ok(LineItem {
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            quantity: u32::try_from(quantity)
                .map_err(|_| StoreError::Corrupt(format!("quantity out of range: {quantity}")))?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        })
    }

    /// Loads the line items of the given orders, grouped by order id.
    async fn load_items(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<LineItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, unit_price_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_index
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
        for row in &rows {
            let order_id: Uuid = row.try_get("order_id")?;
            items.entry(order_id).or_default().push(Self::row_to_item(row)?);
        }
        Ok(items)
    }

    async fn attach_items(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut items = self.load_items(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| Self::row_to_order(row, items.remove(&id).unwrap_or_default()))
            .collect()
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_cents, shipping_address, status, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_str())
        .bind(order.total_amount.cents())
        .bind(&order.shipping_address)
        .bind(order.status.as_str())
        .bind(order.version)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if store::error::is_unique_violation(&e, "orders_pkey") {
                return StoreError::Duplicate {
                    entity: "order",
                    key: order.id.to_string(),
                };
            }
            StoreError::Database(e)
        })?;

        for (index, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, line_index, product_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(index as i32)
            .bind(item.product_id.as_str())
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list(&self, user_id: Option<&UserId>) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE ($1::TEXT IS NULL OR user_id = $1) \
             ORDER BY created_at DESC, id"
        ))
        .bind(user_id.map(UserId::as_str))
        .fetch_all(&self.pool)
        .await?;

        self.attach_items(rows).await
    }

    async fn update_status(
        &self,
        id: OrderId,
        expected_version: i64,
        status: OrderStatus,
    ) -> Result<Order> {
        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(expected_version)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
                .bind(id.as_uuid())
                .fetch_one(&self.pool)
                .await?;
            return Err(if exists {
                StoreError::Conflict {
                    entity: "order",
                    id: id.to_string(),
                    expected: expected_version,
                }
            } else {
                StoreError::NotFound {
                    entity: "order",
                    id: id.to_string(),
                }
            });
        }

        self.get(id).await?.ok_or_else(|| StoreError::NotFound {
            entity: "order",
            id: id.to_string(),
        })
    }
}
