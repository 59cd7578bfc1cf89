use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use store::{Result, StoreError};

use crate::log::{DeliveryLog, DeliveryRecord, DeliveryStatus};

/// In-memory delivery log.
#[derive(Clone, Default)]
pub struct InMemoryDeliveryLog {
    records: Arc<RwLock<Vec<DeliveryRecord>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryDeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with a transient database error (for testing).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryLog for InMemoryDeliveryLog {
    async fn get(&self, token: &str) -> Result<Option<DeliveryRecord>> {
        self.check()?;
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.token == token)
            .cloned())
    }

    async fn upsert(&self, record: &DeliveryRecord) -> Result<()> {
        self.check()?;
        let mut records = self.records.write().await;
        if records
            .iter()
            .any(|r| r.token == record.token && r.status == DeliveryStatus::Sent)
        {
            return Ok(());
        }
        records.retain(|r| r.token != record.token);
        records.push(record.clone());
        Ok(())
    }

    async fn list(&self, recipient: Option<&str>) -> Result<Vec<DeliveryRecord>> {
        self.check()?;
        Ok(self
            .records
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| recipient.is_none_or(|to| r.recipient == to))
            .cloned()
            .collect())
    }
}
