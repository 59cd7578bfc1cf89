//! PostgreSQL integration tests for the order store.
//!
//! These tests need Docker and are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p orders --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use common::{Money, OrderId, UserId};
use orders::{LineItem, Order, OrderStatus, OrderStore, PostgresOrderStore};
use sqlx::PgPool;
use store::StoreError;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPool::connect(&connection_string).await.unwrap();
            store::run_migrations(&pool).await.unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresOrderStore {
    let info = get_container_info().await;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOrderStore::new(pool)
}

fn new_order(user: &str) -> Order {
    Order::new(
        UserId::new(user),
        vec![
            LineItem::new("p1", 2, Money::from_major(10)),
            LineItem::new("p2", 1, Money::from_major(5)),
        ],
        "1 Main St".to_string(),
    )
    .unwrap()
}

#[tokio::test]
#[ignore = "requires Docker (testcontainers)"]
async fn insert_and_get_round_trips_items_in_order() {
    let store = get_test_store().await;
    let order = new_order("alice");
    store.insert(&order).await.unwrap();

    let loaded = store.get(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.items, order.items);
    assert_eq!(loaded.total_amount, Money::from_major(25));
    assert_eq!(loaded.status, OrderStatus::Created);
    assert_eq!(loaded.version, 1);
}

#[tokio::test]
#[ignore = "requires Docker (testcontainers)"]
async fn get_unknown_order_is_none() {
    let store = get_test_store().await;
    assert!(store.get(OrderId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker (testcontainers)"]
async fn list_filters_by_user() {
    let store = get_test_store().await;
    store.insert(&new_order("alice")).await.unwrap();
    store.insert(&new_order("bob")).await.unwrap();

    let alice = UserId::new("alice");
    let orders = store.list(Some(&alice)).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].user_id, alice);
    assert_eq!(orders[0].items.len(), 2);
    assert_eq!(store.list(None).await.unwrap().len(), 2);
}

#[tokio::test]
#[ignore = "requires Docker (testcontainers)"]
async fn stale_version_is_a_conflict() {
    let store = get_test_store().await;
    let order = new_order("alice");
    store.insert(&order).await.unwrap();

    let paid = store
        .update_status(order.id, 1, OrderStatus::Paid)
        .await
        .unwrap();
    assert_eq!(paid.version, 2);
    assert_eq!(paid.status, OrderStatus::Paid);

    let err = store
        .update_status(order.id, 1, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    let err = store
        .update_status(OrderId::new(), 1, OrderStatus::Paid)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}
