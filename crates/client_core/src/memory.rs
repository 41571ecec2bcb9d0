//! In-process [`DocumentStore`].
//!
//! Collections live in a map guarded by an async mutex; every write publishes
//! the collection's full listing on a broadcast channel that each
//! subscription forwards to its reader. Writes and subscriptions can be made
//! to fail on demand.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use shared::domain::{EventFields, EventId, EventPatch, EventRecord};
use shared::error::ApiError;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::debug;

use crate::{
    error::StoreError,
    store::{DocumentStore, Subscription, SubscriptionUpdate, SUBSCRIPTION_BUFFER},
};

const FEED_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
enum FeedEvent {
    Snapshot(Vec<EventRecord>),
    Broken(String),
}

#[derive(Default)]
struct MemoryInner {
    collections: HashMap<String, Vec<EventRecord>>,
    feeds: HashMap<String, broadcast::Sender<FeedEvent>>,
    next_id: u64,
    failing_writes: Option<String>,
}

impl MemoryInner {
    fn feed(&mut self, collection: &str) -> &broadcast::Sender<FeedEvent> {
        self.feeds
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
    }

    fn publish(&mut self, collection: &str) {
        let records = self.collections.get(collection).cloned().unwrap_or_default();
        // No subscribers is fine.
        let _ = self.feed(collection).send(FeedEvent::Snapshot(records));
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        match &self.failing_writes {
            Some(message) => Err(StoreError::Transport(message.clone())),
            None => Ok(()),
        }
    }

    fn find_mut(&mut self, collection: &str, id: &EventId) -> Result<&mut EventRecord, StoreError> {
        self.collections
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|record| &record.id == id))
            .ok_or_else(|| StoreError::Rejected {
                status: 404,
                error: ApiError::not_found(format!("event '{id}' not found")),
            })
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds records without going through the write path.
    pub async fn with_records(
        collection: &str,
        fields: impl IntoIterator<Item = EventFields>,
    ) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().await;
            for fields in fields {
                inner.next_id += 1;
                let id = EventId(format!("mem-{}", inner.next_id));
                inner
                    .collections
                    .entry(collection.to_string())
                    .or_default()
                    .push(EventRecord::new(id, fields));
            }
        }
        store
    }

    pub async fn records(&self, collection: &str) -> Vec<EventRecord> {
        let inner = self.inner.lock().await;
        inner.collections.get(collection).cloned().unwrap_or_default()
    }

    /// Makes every following write fail with a transport error.
    pub async fn fail_writes(&self, message: impl Into<String>) {
        self.inner.lock().await.failing_writes = Some(message.into());
    }

    pub async fn restore_writes(&self) {
        self.inner.lock().await.failing_writes = None;
    }

    /// Ends every open subscription on `collection` with a delivery error.
    pub async fn break_subscriptions(&self, collection: &str, message: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        let _ = inner.feed(collection).send(FeedEvent::Broken(message.into()));
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        let (initial, mut feed_rx) = {
            let mut inner = self.inner.lock().await;
            let feed_rx = inner.feed(collection).subscribe();
            let initial = inner.collections.get(collection).cloned().unwrap_or_default();
            (initial, feed_rx)
        };

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let feed_collection = collection.to_string();
        let feed = tokio::spawn(async move {
            if tx.send(SubscriptionUpdate::Snapshot(initial)).await.is_err() {
                return;
            }
            loop {
                let update = match feed_rx.recv().await {
                    Ok(FeedEvent::Snapshot(records)) => SubscriptionUpdate::Snapshot(records),
                    Ok(FeedEvent::Broken(message)) => {
                        let _ = tx
                            .send(SubscriptionUpdate::Failed(StoreError::Transport(message)))
                            .await;
                        return;
                    }
                    // The newest snapshot is still queued behind the skipped ones.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(collection = %feed_collection, skipped, "memory feed lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let _ = tx.send(SubscriptionUpdate::Failed(StoreError::Closed)).await;
                        return;
                    }
                };
                if tx.send(update).await.is_err() {
                    return;
                }
            }
        });

        Ok(Subscription::new(rx, feed))
    }

    async fn insert(&self, collection: &str, fields: &EventFields) -> Result<EventId, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_writable()?;
        inner.next_id += 1;
        let id = EventId(format!("mem-{}", inner.next_id));
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(EventRecord::new(id.clone(), fields.clone()));
        inner.publish(collection);
        Ok(id)
    }

    async fn update_partial(
        &self,
        collection: &str,
        id: &EventId,
        patch: &EventPatch,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_writable()?;
        let record = inner.find_mut(collection, id)?;
        patch.apply_to(&mut record.fields);
        inner.publish(collection);
        Ok(())
    }

    async fn update_full(
        &self,
        collection: &str,
        id: &EventId,
        fields: &EventFields,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_writable()?;
        let record = inner.find_mut(collection, id)?;
        record.fields = fields.clone();
        inner.publish(collection);
        Ok(())
    }

    async fn delete_by_id(&self, collection: &str, id: &EventId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_writable()?;
        let Some(records) = inner.collections.get_mut(collection) else {
            return Ok(());
        };
        let before = records.len();
        records.retain(|record| &record.id != id);
        if records.len() != before {
            inner.publish(collection);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
