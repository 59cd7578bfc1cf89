//! Service wiring shared by the HTTP handlers and the background workers.

use std::sync::Arc;
use std::time::Duration;

use inventory::{InMemoryStockStore, InventoryLedger, PostgresStockStore, StockStore, StockUpdateHandler};
use messaging::{
    Consumer, EventPublisher, InMemoryMessageChannel, MessageChannel, PostgresMessageChannel,
};
use notifications::{
    DeliveryLog, EmailSender, InMemoryDeliveryLog, InMemoryEmailSender, NotificationDispatcher,
    NotificationHandler, PostgresDeliveryLog,
};
use orders::{InMemoryOrderStore, OrderCoordinator, OrderStore, PostgresOrderStore};
use payments::{
    InMemoryPaymentProvider, InMemoryPaymentStore, PaymentInitiator, PaymentMethod, PaymentStore,
    PostgresPaymentStore, ProviderRegistry,
};
use store::PgPool;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::Config;

/// How often expired decrement tokens are pruned.
pub const TOKEN_PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

pub type Orders = OrderCoordinator<dyn OrderStore, dyn MessageChannel>;
pub type Payments = PaymentInitiator<dyn PaymentStore>;
pub type Inventory = InventoryLedger<dyn StockStore>;
pub type Notifications = NotificationDispatcher<dyn DeliveryLog>;

/// Storage and external capabilities the services are built on.
pub struct Backends {
    pub kind: &'static str,
    pub orders: Arc<dyn OrderStore>,
    pub payments: Arc<dyn PaymentStore>,
    pub stock: Arc<dyn StockStore>,
    pub deliveries: Arc<dyn DeliveryLog>,
    pub channel: Arc<dyn MessageChannel>,
    pub email: Arc<dyn EmailSender>,
    pub providers: ProviderRegistry,
}

impl Backends {
    /// Everything in process memory. Nothing survives a restart.
    pub fn in_memory(config: &Config) -> Self {
        Self {
            kind: "memory",
            orders: Arc::new(InMemoryOrderStore::new()),
            payments: Arc::new(InMemoryPaymentStore::new()),
            stock: Arc::new(InMemoryStockStore::new()),
            deliveries: Arc::new(InMemoryDeliveryLog::new()),
            channel: Arc::new(InMemoryMessageChannel::with_lease_timeout(
                config.lease_timeout,
            )),
            email: Arc::new(InMemoryEmailSender::new()),
            providers: simulated_providers(),
        }
    }

    /// Records and queues in Postgres. Email and payment providers stay
    /// simulated.
    pub fn postgres(pool: PgPool, config: &Config) -> Self {
        Self {
            kind: "postgres",
            orders: Arc::new(PostgresOrderStore::new(pool.clone())),
            payments: Arc::new(PostgresPaymentStore::new(pool.clone())),
            stock: Arc::new(PostgresStockStore::new(pool.clone())),
            deliveries: Arc::new(PostgresDeliveryLog::new(pool.clone())),
            channel: Arc::new(PostgresMessageChannel::new(pool, config.lease_timeout)),
            email: Arc::new(InMemoryEmailSender::new()),
            providers: simulated_providers(),
        }
    }
}

fn simulated_providers() -> ProviderRegistry {
    ProviderRegistry::new()
        .register(Arc::new(InMemoryPaymentProvider::new(PaymentMethod::Stripe)))
        .register(Arc::new(InMemoryPaymentProvider::new(
            PaymentMethod::MercadoPago,
        )))
}

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub storage: &'static str,
    pub orders: Orders,
    pub payments: Payments,
    pub inventory: Arc<Inventory>,
    pub notifications: Arc<Notifications>,
    pub channel: Arc<dyn MessageChannel>,
}

impl AppState {
    pub fn new(backends: Backends, config: &Config) -> Self {
        let publisher = EventPublisher::new(backends.channel.clone(), config.publish_retry());
        Self {
            storage: backends.kind,
            orders: OrderCoordinator::new(backends.orders, publisher),
            payments: PaymentInitiator::new(backends.payments, backends.providers)
                .with_provider_timeout(config.provider_timeout),
            inventory: Arc::new(InventoryLedger::with_token_retention(
                backends.stock,
                config.token_retention,
            )),
            notifications: Arc::new(NotificationDispatcher::new(
                backends.deliveries,
                backends.email,
            )),
            channel: backends.channel,
        }
    }

    /// Starts the consumer pools for both queues and the token pruning task.
    ///
    /// Every task returns once `shutdown` turns true.
    pub fn spawn_workers(
        &self,
        config: &Config,
        shutdown: &watch::Receiver<bool>,
        tasks: &mut JoinSet<()>,
    ) {
        let stock_consumer = Consumer::new(
            self.channel.clone(),
            Arc::new(StockUpdateHandler::new(self.inventory.clone())),
            config.consumer_config(),
        );
        stock_consumer.spawn_workers(config.consumer_workers, shutdown, tasks);

        let notification_consumer = Consumer::new(
            self.channel.clone(),
            Arc::new(NotificationHandler::new(self.notifications.clone())),
            config.consumer_config(),
        );
        notification_consumer.spawn_workers(config.consumer_workers, shutdown, tasks);

        tasks.spawn(prune_tokens(
            self.inventory.clone(),
            TOKEN_PRUNE_INTERVAL,
            shutdown.clone(),
        ));
    }
}

async fn prune_tokens(
    ledger: Arc<Inventory>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = ledger.prune_expired_tokens().await {
                    tracing::warn!(error = %e, "token pruning failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Builds the state for `config`: Postgres when a database URL is set
/// (migrations are applied first), in-memory otherwise.
pub async fn build_state(config: &Config) -> store::Result<AppState> {
    let backends = match &config.database_url {
        Some(url) => {
            let pool = store::connect(url, config.database_max_connections).await?;
            store::run_migrations(&pool).await?;
            Backends::postgres(pool, config)
        }
        None => Backends::in_memory(config),
    };
    tracing::info!(storage = backends.kind, "application state ready");
    Ok(AppState::new(backends, config))
}
