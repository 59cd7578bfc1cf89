use std::sync::Arc;

use chrono::Utc;

use messaging::NotificationRequest;

use crate::log::{DeliveryLog, DeliveryRecord, DeliveryStatus};
use crate::sender::EmailSender;
use crate::{Result, render};

/// What happened to a notification request.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Sent now.
    Delivered(DeliveryRecord),
    /// The token was already delivered; nothing was sent.
    AlreadyDelivered(DeliveryRecord),
    /// The sender failed. The failure is logged and a redelivery will retry.
    Failed(DeliveryRecord),
}

impl DispatchOutcome {
    pub fn record(&self) -> &DeliveryRecord {
        match self {
            DispatchOutcome::Delivered(r)
            | DispatchOutcome::AlreadyDelivered(r)
            | DispatchOutcome::Failed(r) => r,
        }
    }

    /// True unless the send failed.
    pub fn is_success(&self) -> bool {
        !matches!(self, DispatchOutcome::Failed(_))
    }
}

/// Renders and delivers notifications at most once per token.
pub struct NotificationDispatcher<L: DeliveryLog + ?Sized> {
    log: Arc<L>,
    sender: Arc<dyn EmailSender>,
}

impl<L: DeliveryLog + ?Sized> NotificationDispatcher<L> {
    pub fn new(log: Arc<L>, sender: Arc<dyn EmailSender>) -> Self {
        Self { log, sender }
    }

    /// Delivers `request` unless its token is already logged as sent.
    ///
    /// Only delivery-log failures are returned as errors; a failed send is
    /// an outcome.
    #[tracing::instrument(
        skip(self, request),
        fields(token = %request.idempotency_token, template = %request.template)
    )]
    pub async fn dispatch(&self, request: &NotificationRequest) -> Result<DispatchOutcome> {
        let token = request.idempotency_token.as_str();
        let previous = self.log.get(token).await?;

        if let Some(record) = previous.as_ref().filter(|r| r.status == DeliveryStatus::Sent) {
            tracing::info!("notification already delivered, skipping");
            metrics::counter!("notifications_duplicate_total").increment(1);
            return Ok(DispatchOutcome::AlreadyDelivered(record.clone()));
        }

        let email = render(&request.template, &request.data);
        let subject = request.subject.clone().unwrap_or(email.subject);
        let now = Utc::now();
        let mut record = DeliveryRecord {
            token: token.to_string(),
            recipient: request.recipient.clone(),
            template: request.template.clone(),
            subject,
            channel: self.sender.channel().to_string(),
            status: DeliveryStatus::Sent,
            message_id: None,
            error: None,
            attempts: previous.as_ref().map_or(1, |r| r.attempts + 1),
            data: request.data.clone(),
            created_at: previous.as_ref().map_or(now, |r| r.created_at),
            updated_at: now,
        };

        let outcome = match self
            .sender
            .send(&request.recipient, &record.subject, &email.html)
            .await
        {
            Ok(message_id) => {
                tracing::info!(recipient = %request.recipient, %message_id, "notification delivered");
                metrics::counter!("notifications_sent_total", "template" => request.template.clone())
                    .increment(1);
                record.message_id = Some(message_id);
                DispatchOutcome::Delivered(record)
            }
            Err(e) => {
                tracing::error!(
                    recipient = %request.recipient,
                    attempts = record.attempts,
                    error = %e,
                    "notification delivery failed"
                );
                metrics::counter!("notifications_failed_total", "template" => request.template.clone())
                    .increment(1);
                record.status = DeliveryStatus::Failed;
                record.error = Some(e.to_string());
                DispatchOutcome::Failed(record)
            }
        };

        self.log.upsert(outcome.record()).await?;
        Ok(outcome)
    }

    /// Lists delivery records, most recent first.
    pub async fn list_deliveries(&self, recipient: Option<&str>) -> Result<Vec<DeliveryRecord>> {
        Ok(self.log.list(recipient).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryDeliveryLog, InMemoryEmailSender, NotificationError};
    use common::{IdempotencyToken, OrderId};
    use messaging::ORDER_CONFIRMATION;
    use serde_json::json;

    fn setup() -> (
        NotificationDispatcher<InMemoryDeliveryLog>,
        Arc<InMemoryDeliveryLog>,
        InMemoryEmailSender,
    ) {
        let log = Arc::new(InMemoryDeliveryLog::new());
        let sender = InMemoryEmailSender::new();
        let dispatcher = NotificationDispatcher::new(log.clone(), Arc::new(sender.clone()));
        (dispatcher, log, sender)
    }

    fn confirmation(recipient: &str) -> NotificationRequest {
        let order_id = OrderId::new();
        NotificationRequest {
            recipient: recipient.to_string(),
            subject: None,
            template: ORDER_CONFIRMATION.to_string(),
            data: json!({ "order_id": order_id.to_string(), "total_amount": "25.00" }),
            idempotency_token: IdempotencyToken::for_notification(order_id, ORDER_CONFIRMATION),
        }
    }

    #[tokio::test]
    async fn same_token_is_delivered_once() {
        let (dispatcher, log, sender) = setup();
        let request = confirmation("user-1");

        let first = dispatcher.dispatch(&request).await.unwrap();
        let second = dispatcher.dispatch(&request).await.unwrap();

        assert!(matches!(first, DispatchOutcome::Delivered(_)));
        assert!(matches!(second, DispatchOutcome::AlreadyDelivered(_)));
        assert!(first.is_success() && second.is_success());
        assert_eq!(sender.sent().await.len(), 1);
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn rendered_email_reaches_sender() {
        let (dispatcher, _, sender) = setup();

        let outcome = dispatcher.dispatch(&confirmation("user-1")).await.unwrap();

        let sent = sender.sent().await;
        assert_eq!(sent[0].to, "user-1");
        assert_eq!(sent[0].subject, "Order Confirmation");
        assert!(sent[0].html.contains("Total Amount: $25.00"));
        assert_eq!(outcome.record().message_id.as_deref(), Some("MSG-0001"));
        assert_eq!(outcome.record().channel, "email");
    }

    #[tokio::test]
    async fn subject_override_wins() {
        let (dispatcher, _, sender) = setup();
        let mut request = confirmation("user-1");
        request.subject = Some("Your receipt".to_string());

        dispatcher.dispatch(&request).await.unwrap();

        assert_eq!(sender.sent().await[0].subject, "Your receipt");
    }

    #[tokio::test]
    async fn failed_send_is_recorded_and_retried_later() {
        let (dispatcher, log, sender) = setup();
        let request = confirmation("user-1");

        sender.set_fail(true);
        let failed = dispatcher.dispatch(&request).await.unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.record().status, DeliveryStatus::Failed);
        assert!(failed.record().error.is_some());

        sender.set_fail(false);
        let retried = dispatcher.dispatch(&request).await.unwrap();
        assert!(matches!(retried, DispatchOutcome::Delivered(_)));
        assert_eq!(retried.record().attempts, 2);
        assert_eq!(retried.record().created_at, failed.record().created_at);
        assert_eq!(log.len().await, 1);
    }

    /// Holds its first send until released, then fails it. Later sends
    /// are delegated to an in-memory sender.
    struct GatedSender {
        inner: InMemoryEmailSender,
        calls: std::sync::atomic::AtomicU32,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl EmailSender for GatedSender {
        fn channel(&self) -> &'static str {
            "email"
        }

        async fn send(
            &self,
            to: &str,
            subject: &str,
            html: &str,
        ) -> std::result::Result<String, crate::SendError> {
            use std::sync::atomic::Ordering;
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.entered.notify_one();
                self.release.notified().await;
                return Err(crate::SendError("relay timed out".to_string()));
            }
            self.inner.send(to, subject, html).await
        }
    }

    #[tokio::test]
    async fn late_failure_does_not_undo_concurrent_delivery() {
        let log = Arc::new(InMemoryDeliveryLog::new());
        let inner = InMemoryEmailSender::new();
        let sender = Arc::new(GatedSender {
            inner: inner.clone(),
            calls: Default::default(),
            entered: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
        });
        let dispatcher = Arc::new(NotificationDispatcher::new(log.clone(), sender.clone()));
        let request = confirmation("user-1");

        let slow = tokio::spawn({
            let dispatcher = dispatcher.clone();
            let request = request.clone();
            async move { dispatcher.dispatch(&request).await }
        });
        sender.entered.notified().await;

        let fast = dispatcher.dispatch(&request).await.unwrap();
        assert!(matches!(fast, DispatchOutcome::Delivered(_)));

        sender.release.notify_one();
        let slow = slow.await.unwrap().unwrap();
        assert!(matches!(slow, DispatchOutcome::Failed(_)));

        let stored = log.get(request.idempotency_token.as_str()).await.unwrap().unwrap();
        assert_eq!(stored.status, DeliveryStatus::Sent);

        let again = dispatcher.dispatch(&request).await.unwrap();
        assert!(matches!(again, DispatchOutcome::AlreadyDelivered(_)));
        assert_eq!(inner.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn log_failure_is_an_error() {
        let (dispatcher, log, sender) = setup();
        log.set_fail(true);

        let err = dispatcher
            .dispatch(&confirmation("user-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, NotificationError::Store(_)));
        assert!(sender.sent().await.is_empty());
    }

    #[tokio::test]
    async fn list_filters_by_recipient() {
        let (dispatcher, _, _) = setup();
        dispatcher.dispatch(&confirmation("alice")).await.unwrap();
        dispatcher.dispatch(&confirmation("bob")).await.unwrap();
        dispatcher.dispatch(&confirmation("alice")).await.unwrap();

        assert_eq!(dispatcher.list_deliveries(Some("alice")).await.unwrap().len(), 2);
        assert_eq!(dispatcher.list_deliveries(None).await.unwrap().len(), 3);
    }
}
