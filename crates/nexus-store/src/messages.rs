//! Append-only per-sender log of direct and file deliveries.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::backend::{load_collection, save_collection, DurableStore, MESSAGES};
use crate::error::Result;
use crate::models::DeliveryRecord;

pub struct DeliveryLog {
    backend: Arc<dyn DurableStore>,
    records: Mutex<BTreeMap<String, Vec<DeliveryRecord>>>,
}

impl DeliveryLog {
    /// Load the messages collection from `backend`.
    pub fn load(backend: Arc<dyn DurableStore>) -> Result<Self> {
        let records: BTreeMap<String, Vec<DeliveryRecord>> =
            load_collection(backend.as_ref(), MESSAGES)?;
        Ok(Self {
            backend,
            records: Mutex::new(records),
        })
    }

    /// Append `record` to its sender's log and persist.
    pub async fn append(&self, record: DeliveryRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        let sender = record.sender.clone();

        records.entry(sender.clone()).or_default().push(record);
        let saved = save_collection(&self.backend, MESSAGES, &*records).await;
        if let Err(e) = saved {
            if let Some(log) = records.get_mut(&sender) {
                log.pop();
                if log.is_empty() {
                    records.remove(&sender);
                }
            }
            return Err(e);
        }

        debug!(sender = %sender, "Delivery recorded");
        Ok(())
    }

    /// Everything `sender` has sent directly, oldest first.
    pub async fn history(&self, sender: &str) -> Vec<DeliveryRecord> {
        self.records
            .lock()
            .await
            .get(sender)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::FailingStore;
    use crate::backend::MemoryStore;

    #[tokio::test]
    async fn test_append_in_order() {
        let log = DeliveryLog::load(Arc::new(MemoryStore::new())).unwrap();

        log.append(DeliveryRecord::new("alice", "bob", "one")).await.unwrap();
        log.append(DeliveryRecord::new("alice", "carol", "two")).await.unwrap();
        log.append(DeliveryRecord::new("bob", "alice", "three")).await.unwrap();

        let history = log.history("alice").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "one");
        assert_eq!(history[1].recipient, "carol");
        assert!(history[0].timestamp <= history[1].timestamp);
        assert_eq!(log.history("bob").await.len(), 1);
        assert!(log.history("nobody").await.is_empty());
    }

    #[tokio::test]
    async fn test_log_persists() {
        let backend: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let log = DeliveryLog::load(backend.clone()).unwrap();
        log.append(DeliveryRecord::new("alice", "bob", "hello")).await.unwrap();

        let reloaded = DeliveryLog::load(backend).unwrap();
        let history = reloaded.history("alice").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "hello");
    }

    #[tokio::test]
    async fn test_failed_persist_drops_record() {
        let log = DeliveryLog::load(Arc::new(FailingStore)).unwrap();
        assert!(log
            .append(DeliveryRecord::new("alice", "bob", "lost"))
            .await
            .is_err());
        assert!(log.history("alice").await.is_empty());
    }
}
