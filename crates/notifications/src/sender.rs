//! Email delivery capability.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// Failure reported by an [`EmailSender`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("email delivery failed: {0}")]
pub struct SendError(pub String);

/// Delivers rendered emails.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Name recorded in the delivery log, e.g. `email`.
    fn channel(&self) -> &'static str;

    /// Sends one email and returns the provider's message id.
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<String, SendError>;
}

/// An email captured by [`InMemoryEmailSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub message_id: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Sender that keeps emails in memory and logs them.
///
/// Used by tests and by the binary when no mail provider is configured.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEmailSender {
    sent: Arc<RwLock<Vec<SentEmail>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent sends fail (for testing).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl EmailSender for InMemoryEmailSender {
    fn channel(&self) -> &'static str {
        "email"
    }

    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<String, SendError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SendError("mail relay rejected the message".to_string()));
        }

        let mut sent = self.sent.write().await;
        let message_id = format!("MSG-{:04}", sent.len() + 1);
        tracing::info!(to, subject, %message_id, "email sent");
        sent.push(SentEmail {
            message_id: message_id.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(message_id)
    }
}
