//! Payment provider capability and an in-memory simulation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use common::Money;

use crate::{Currency, PaymentMethod};

/// An intent opened at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub external_reference: String,
    /// Handed to the client to finish the payment.
    pub client_handle: String,
}

/// Failure of a provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("declined: {0}")]
    Declined(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Opens payment intents with one external provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// The method this provider serves.
    fn method(&self) -> PaymentMethod;

    async fn create_intent(
        &self,
        amount: Money,
        currency: &Currency,
    ) -> Result<PaymentIntent, ProviderError>;
}

/// Providers keyed by payment method.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<PaymentMethod, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` for the method it reports, replacing any previous one.
    pub fn register(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.providers.insert(provider.method(), provider);
        self
    }

    pub fn get(&self, method: PaymentMethod) -> Option<&Arc<dyn PaymentProvider>> {
        self.providers.get(&method)
    }
}

#[derive(Debug, Default)]
struct InMemoryProviderState {
    next_id: u32,
    intents: Vec<(PaymentIntent, Money, Currency)>,
    fail_with: Option<ProviderError>,
    delay: Option<Duration>,
}

/// Simulated provider that issues sequential references.
///
/// Stripe-style references look like `pi_0001` with a `_secret` client
/// handle; MercadoPago-style ones look like `mp_0001` with an `_init`
/// checkout handle.
#[derive(Debug, Clone)]
pub struct InMemoryPaymentProvider {
    method: PaymentMethod,
    state: Arc<RwLock<InMemoryProviderState>>,
}

impl InMemoryPaymentProvider {
    pub fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            state: Arc::new(RwLock::new(InMemoryProviderState::default())),
        }
    }

    /// Makes subsequent calls fail with `error` (or succeed again with `None`).
    pub async fn set_fail_with(&self, error: Option<ProviderError>) {
        self.state.write().await.fail_with = error;
    }

    /// Makes subsequent calls take `delay` before answering.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().await.delay = delay;
    }

    /// Number of intents opened so far.
    pub async fn intent_count(&self) -> usize {
        self.state.read().await.intents.len()
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    fn method(&self) -> PaymentMethod {
        self.method
    }

    async fn create_intent(
        &self,
        amount: Money,
        currency: &Currency,
    ) -> Result<PaymentIntent, ProviderError> {
        let delay = self.state.read().await.delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        if let Some(error) = &state.fail_with {
            return Err(error.clone());
        }

        state.next_id += 1;
        let intent = match self.method {
            PaymentMethod::Stripe => {
                let reference = format!("pi_{:04}", state.next_id);
                PaymentIntent {
                    client_handle: format!("{reference}_secret"),
                    external_reference: reference,
                }
            }
            PaymentMethod::MercadoPago => {
                let reference = format!("mp_{:04}", state.next_id);
                PaymentIntent {
                    client_handle: format!("{reference}_init"),
                    external_reference: reference,
                }
            }
        };
        state.intents.push((intent.clone(), amount, currency.clone()));
        Ok(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issues_sequential_references() {
        let provider = InMemoryPaymentProvider::new(PaymentMethod::Stripe);

        let first = provider
            .create_intent(Money::from_major(10), &Currency::usd())
            .await
            .unwrap();
        let second = provider
            .create_intent(Money::from_major(10), &Currency::usd())
            .await
            .unwrap();

        assert_eq!(first.external_reference, "pi_0001");
        assert_eq!(first.client_handle, "pi_0001_secret");
        assert_eq!(second.external_reference, "pi_0002");
        assert_eq!(provider.intent_count().await, 2);
    }

    #[tokio::test]
    async fn configured_failure_is_returned() {
        let provider = InMemoryPaymentProvider::new(PaymentMethod::MercadoPago);
        provider
            .set_fail_with(Some(ProviderError::Declined("card".into())))
            .await;

        let err = provider
            .create_intent(Money::from_major(10), &Currency::usd())
            .await
            .unwrap_err();

        assert_eq!(err, ProviderError::Declined("card".into()));
        assert_eq!(provider.intent_count().await, 0);
    }

    #[test]
    fn registry_looks_up_by_method() {
        let registry = ProviderRegistry::new()
            .register(Arc::new(InMemoryPaymentProvider::new(PaymentMethod::Stripe)));

        assert!(registry.get(PaymentMethod::Stripe).is_some());
        assert!(registry.get(PaymentMethod::MercadoPago).is_none());
    }
}
