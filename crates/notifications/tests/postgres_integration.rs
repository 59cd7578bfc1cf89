//! PostgreSQL integration tests for the delivery log.
//!
//! These tests need Docker and are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p notifications --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use common::{IdempotencyToken, OrderId};
use messaging::{NotificationRequest, ORDER_CONFIRMATION};
use notifications::{
    DeliveryLog, DeliveryStatus, DispatchOutcome, InMemoryDeliveryLog, InMemoryEmailSender,
    NotificationDispatcher, PostgresDeliveryLog,
};
use sqlx::PgPool;
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

async fn get_test_log() -> PostgresDeliveryLog {
    let info = get_container_info().await;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE notification_deliveries")
        .execute(&pool)
        .await
        .unwrap();

    PostgresDeliveryLog::new(pool)
}

fn confirmation(recipient: &str) -> NotificationRequest {
    let order_id = OrderId::new();
    NotificationRequest {
        recipient: recipient.to_string(),
        subject: None,
        template: ORDER_CONFIRMATION.to_string(),
        data: serde_json::json!({ "order_id": order_id.to_string(), "total_amount": "10.00" }),
        idempotency_token: IdempotencyToken::for_notification(order_id, ORDER_CONFIRMATION),
    }
}

#[tokio::test]
#[ignore = "requires Docker (testcontainers)"]
async fn failed_delivery_is_overwritten_by_retry() {
    let log = Arc::new(get_test_log().await);
    let sender = InMemoryEmailSender::new();
    let dispatcher = NotificationDispatcher::new(log.clone(), Arc::new(sender.clone()));
    let request = confirmation("alice");

    sender.set_fail(true);
    let failed = dispatcher.dispatch(&request).await.unwrap();
    assert!(matches!(failed, DispatchOutcome::Failed(_)));

    sender.set_fail(false);
    dispatcher.dispatch(&request).await.unwrap();
    let again = dispatcher.dispatch(&request).await.unwrap();
    assert!(matches!(again, DispatchOutcome::AlreadyDelivered(_)));

    let record = log
        .get(request.idempotency_token.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, DeliveryStatus::Sent);
    assert_eq!(record.attempts, 2);
    assert_eq!(sender.sent().await.len(), 1);
}

#[tokio::test]
#[ignore = "requires Docker (testcontainers)"]
async fn list_filters_by_recipient() {
    let log = Arc::new(get_test_log().await);
    let dispatcher = NotificationDispatcher::new(log, Arc::new(InMemoryEmailSender::new()));

    dispatcher.dispatch(&confirmation("alice")).await.unwrap();
    dispatcher.dispatch(&confirmation("bob")).await.unwrap();

    let alice = dispatcher.list_deliveries(Some("alice")).await.unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].recipient, "alice");
    assert_eq!(dispatcher.list_deliveries(None).await.unwrap().len(), 2);
}

#[tokio::test]
#[ignore = "requires Docker (testcontainers)"]
async fn sent_record_is_never_downgraded() {
    let log = get_test_log().await;
    let dispatcher = NotificationDispatcher::new(
        Arc::new(InMemoryDeliveryLog::new()),
        Arc::new(InMemoryEmailSender::new()),
    );
    let sent = dispatcher
        .dispatch(&confirmation("alice"))
        .await
        .unwrap()
        .record()
        .clone();
    log.upsert(&sent).await.unwrap();

    let mut failed = sent.clone();
    failed.status = DeliveryStatus::Failed;
    failed.error = Some("smtp timeout".to_string());
    failed.attempts += 1;
    log.upsert(&failed).await.unwrap();

    let stored = log.get(&sent.token).await.unwrap().unwrap();
    assert_eq!(stored.status, DeliveryStatus::Sent);
    assert_eq!(stored.attempts, sent.attempts);
    assert!(stored.error.is_none());
}
