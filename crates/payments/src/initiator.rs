use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use common::{Money, OrderId, PaymentId, UserId};
use store::StoreError;

use crate::store::PaymentStore;
use crate::{
    Currency, Payment, PaymentError, PaymentMethod, PaymentReceipt, PaymentStatus, ProviderError,
    ProviderRegistry, Result,
};

/// Default upper bound on a single provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_UPDATE_ATTEMPTS: u32 = 3;

/// Input of [`PaymentInitiator::create_payment`].
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub method: PaymentMethod,
    /// Three-letter code; `USD` when absent.
    pub currency: Option<String>,
}

/// Opens provider intents and records payments.
pub struct PaymentInitiator<S: PaymentStore + ?Sized> {
    store: Arc<S>,
    providers: ProviderRegistry,
    provider_timeout: Duration,
    update_attempts: u32,
}

impl<S: PaymentStore + ?Sized> PaymentInitiator<S> {
    pub fn new(store: Arc<S>, providers: ProviderRegistry) -> Self {
        Self {
            store,
            providers,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            update_attempts: DEFAULT_UPDATE_ATTEMPTS,
        }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Opens a payment intent for an order and records it as `PENDING`.
    ///
    /// Nothing is written when the provider fails or times out. A second
    /// payment for the same order is refused before the provider is called.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, method = %request.method))]
    pub async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentReceipt> {
        if !request.amount.is_positive() {
            return Err(PaymentError::InvalidRequest(
                "amount must be positive".to_string(),
            ));
        }
        if request.user_id.is_blank() {
            return Err(PaymentError::InvalidRequest(
                "user id is required".to_string(),
            ));
        }
        let currency = match request.currency.as_deref() {
            None => Currency::usd(),
            Some(code) => Currency::parse(code).ok_or_else(|| {
                PaymentError::InvalidRequest(format!("invalid currency code: {code}"))
            })?,
        };
        let provider = self
            .providers
            .get(request.method)
            .ok_or(PaymentError::UnsupportedMethod(request.method))?;

        if self.store.find_by_order(request.order_id).await?.is_some() {
            return Err(PaymentError::DuplicatePayment(request.order_id));
        }

        let started = Instant::now();
        let intent = match tokio::time::timeout(
            self.provider_timeout,
            provider.create_intent(request.amount, &currency),
        )
        .await
        {
            Ok(Ok(intent)) => intent,
            Ok(Err(e)) => return Err(self.provider_failed(request.method, e)),
            Err(_) => {
                return Err(self.provider_failed(
                    request.method,
                    ProviderError::Timeout(self.provider_timeout),
                ));
            }
        };
        metrics::histogram!("payment_provider_duration_seconds", "method" => request.method.as_str())
            .record(started.elapsed().as_secs_f64());

        let now = Utc::now();
        let payment = Payment {
            id: PaymentId::new(),
            order_id: request.order_id,
            user_id: request.user_id,
            amount: request.amount,
            currency,
            method: request.method,
            external_reference: intent.external_reference,
            status: PaymentStatus::Pending,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert(&payment).await {
            Ok(()) => {}
            Err(StoreError::Duplicate { .. }) => {
                tracing::warn!(
                    external_reference = %payment.external_reference,
                    "concurrent payment for order won, provider intent left unused"
                );
                return Err(PaymentError::DuplicatePayment(payment.order_id));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            payment_id = %payment.id,
            amount = %payment.amount,
            currency = %payment.currency,
            "payment created"
        );
        metrics::counter!("payments_created_total", "method" => payment.method.as_str())
            .increment(1);

        Ok(PaymentReceipt {
            payment,
            client_handle: intent.client_handle,
        })
    }

    fn provider_failed(&self, method: PaymentMethod, error: ProviderError) -> PaymentError {
        tracing::error!(%method, error = %error, "payment provider call failed");
        metrics::counter!("payment_provider_failures_total", "method" => method.as_str())
            .increment(1);
        PaymentError::Provider(error)
    }

    /// Moves a payment to `new_status` if its lifecycle allows it.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        payment_id: PaymentId,
        new_status: PaymentStatus,
    ) -> Result<Payment> {
        let mut attempt = 1;
        loop {
            let payment = self.get_payment(payment_id).await?;
            if !payment.status.can_transition_to(new_status) {
                return Err(PaymentError::InvalidTransition {
                    from: payment.status,
                    to: new_status,
                });
            }

            match self
                .store
                .update_status(payment_id, payment.version, new_status)
                .await
            {
                Ok(updated) => {
                    tracing::info!(%payment_id, from = %payment.status, to = %new_status, "payment status updated");
                    return Ok(updated);
                }
                Err(StoreError::Conflict { .. }) if attempt < self.update_attempts => {
                    tracing::debug!(%payment_id, attempt, "version conflict, reloading payment");
                    attempt += 1;
                }
                Err(StoreError::NotFound { .. }) => {
                    return Err(PaymentError::NotFound(payment_id.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn get_payment(&self, payment_id: PaymentId) -> Result<Payment> {
        self.store
            .get(payment_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(payment_id.to_string()))
    }

    /// The payment of an order.
    pub async fn find_by_order(&self, order_id: OrderId) -> Result<Payment> {
        self.store
            .find_by_order(order_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("order {order_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryPaymentProvider, InMemoryPaymentStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fixture {
        initiator: PaymentInitiator<InMemoryPaymentStore>,
        store: Arc<InMemoryPaymentStore>,
        stripe: InMemoryPaymentProvider,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryPaymentStore::new());
        let stripe = InMemoryPaymentProvider::new(PaymentMethod::Stripe);
        let providers = ProviderRegistry::new().register(Arc::new(stripe.clone()));
        Fixture {
            initiator: PaymentInitiator::new(store.clone(), providers)
                .with_provider_timeout(Duration::from_millis(500)),
            store,
            stripe,
        }
    }

    fn request(order_id: OrderId) -> PaymentRequest {
        PaymentRequest {
            order_id,
            user_id: UserId::new("user-1"),
            amount: Money::from_major(25),
            method: PaymentMethod::Stripe,
            currency: None,
        }
    }

    #[tokio::test]
    async fn creates_pending_payment_with_client_handle() {
        let f = fixture();
        let order_id = OrderId::new();

        let receipt = f.initiator.create_payment(request(order_id)).await.unwrap();

        assert_eq!(receipt.payment.status, PaymentStatus::Pending);
        assert_eq!(receipt.payment.currency, Currency::usd());
        assert_eq!(receipt.payment.external_reference, "pi_0001");
        assert_eq!(receipt.client_handle, "pi_0001_secret");
        assert_eq!(
            f.initiator.find_by_order(order_id).await.unwrap(),
            receipt.payment
        );
    }

    #[tokio::test]
    async fn second_payment_for_order_is_duplicate() {
        let f = fixture();
        let order_id = OrderId::new();

        f.initiator.create_payment(request(order_id)).await.unwrap();
        let err = f
            .initiator
            .create_payment(request(order_id))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::DuplicatePayment(id) if id == order_id));
        assert_eq!(f.store.len().await, 1);
        assert_eq!(f.stripe.intent_count().await, 1);
    }

    /// Lets a rival payment for the same order land between the
    /// duplicate check and the insert.
    struct RacingStore {
        inner: InMemoryPaymentStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl PaymentStore for RacingStore {
        async fn insert(&self, payment: &Payment) -> store::Result<()> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let rival = Payment {
                    id: PaymentId::new(),
                    external_reference: "pi_rival".to_string(),
                    ..payment.clone()
                };
                self.inner.insert(&rival).await?;
            }
            self.inner.insert(payment).await
        }

        async fn get(&self, id: PaymentId) -> store::Result<Option<Payment>> {
            self.inner.get(id).await
        }

        async fn find_by_order(&self, order_id: OrderId) -> store::Result<Option<Payment>> {
            self.inner.find_by_order(order_id).await
        }

        async fn update_status(
            &self,
            id: PaymentId,
            expected_version: i64,
            status: PaymentStatus,
        ) -> store::Result<Payment> {
            self.inner.update_status(id, expected_version, status).await
        }
    }

    #[tokio::test]
    async fn concurrent_payment_loses_at_insert() {
        let store = Arc::new(RacingStore {
            inner: InMemoryPaymentStore::new(),
            raced: AtomicBool::new(false),
        });
        let stripe = InMemoryPaymentProvider::new(PaymentMethod::Stripe);
        let providers = ProviderRegistry::new().register(Arc::new(stripe.clone()));
        let initiator = PaymentInitiator::new(store.clone(), providers);
        let order_id = OrderId::new();

        let err = initiator.create_payment(request(order_id)).await.unwrap_err();

        assert!(matches!(err, PaymentError::DuplicatePayment(id) if id == order_id));
        assert_eq!(stripe.intent_count().await, 1);
        assert_eq!(store.inner.len().await, 1);
        let stored = initiator.find_by_order(order_id).await.unwrap();
        assert_eq!(stored.external_reference, "pi_rival");
    }

    #[tokio::test]
    async fn provider_failure_writes_nothing() {
        let f = fixture();
        f.stripe
            .set_fail_with(Some(ProviderError::Unavailable("503".into())))
            .await;

        let err = f
            .initiator
            .create_payment(request(OrderId::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Provider(ProviderError::Unavailable(_))));
        assert!(f.store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let f = fixture();
        f.stripe.set_delay(Some(Duration::from_secs(5))).await;

        let err = f
            .initiator
            .create_payment(request(OrderId::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Provider(ProviderError::Timeout(_))));
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn validates_request() {
        let f = fixture();

        let mut zero = request(OrderId::new());
        zero.amount = Money::zero();
        let mut bad_currency = request(OrderId::new());
        bad_currency.currency = Some("DOLLARS".to_string());
        let mut anonymous = request(OrderId::new());
        anonymous.user_id = UserId::new("");

        for req in [zero, bad_currency, anonymous] {
            let err = f.initiator.create_payment(req).await.unwrap_err();
            assert!(matches!(err, PaymentError::InvalidRequest(_)));
        }
        assert_eq!(f.stripe.intent_count().await, 0);
    }

    #[tokio::test]
    async fn currency_is_normalised() {
        let f = fixture();
        let mut req = request(OrderId::new());
        req.currency = Some("ars".to_string());

        let receipt = f.initiator.create_payment(req).await.unwrap();
        assert_eq!(receipt.payment.currency.as_str(), "ARS");
    }

    #[tokio::test]
    async fn unregistered_method_is_unsupported() {
        let f = fixture();
        let mut req = request(OrderId::new());
        req.method = PaymentMethod::MercadoPago;

        let err = f.initiator.create_payment(req).await.unwrap_err();
        assert!(matches!(err, PaymentError::UnsupportedMethod(PaymentMethod::MercadoPago)));
    }

    #[tokio::test]
    async fn status_transitions_are_enforced() {
        let f = fixture();
        let receipt = f.initiator.create_payment(request(OrderId::new())).await.unwrap();
        let id = receipt.payment.id;

        let succeeded = f
            .initiator
            .update_status(id, PaymentStatus::Succeeded)
            .await
            .unwrap();
        assert_eq!(succeeded.version, 2);

        let err = f
            .initiator
            .update_status(id, PaymentStatus::Failed)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidTransition { .. }));

        let refunded = f
            .initiator
            .update_status(id, PaymentStatus::Refunded)
            .await
            .unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn unknown_payment_is_not_found() {
        let f = fixture();
        let err = f
            .initiator
            .update_status(PaymentId::new(), PaymentStatus::Succeeded)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NotFound(_)));
        assert!(matches!(
            f.initiator.find_by_order(OrderId::new()).await,
            Err(PaymentError::NotFound(_))
        ));
    }
}
