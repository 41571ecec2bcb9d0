//! The document store seam.
//!
//! Everything the dashboard needs from the store goes through
//! [`DocumentStore`]: one live subscription per collection plus four
//! single-document writes. Delivery, durability and conflict handling belong
//! to the implementation.

use async_trait::async_trait;
use shared::domain::{EventFields, EventId, EventPatch, EventRecord};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::error::StoreError;

/// Buffered updates per subscription before the feed task waits on the reader.
pub const SUBSCRIPTION_BUFFER: usize = 64;

#[derive(Debug)]
pub enum SubscriptionUpdate {
    /// Every record of the collection, in the store's document order.
    Snapshot(Vec<EventRecord>),
    /// Delivery stopped. No further updates follow.
    Failed(StoreError),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError>;
    async fn insert(&self, collection: &str, fields: &EventFields) -> Result<EventId, StoreError>;
    async fn update_partial(
        &self,
        collection: &str,
        id: &EventId,
        patch: &EventPatch,
    ) -> Result<(), StoreError>;
    async fn update_full(
        &self,
        collection: &str,
        id: &EventId,
        fields: &EventFields,
    ) -> Result<(), StoreError>;
    async fn delete_by_id(&self, collection: &str, id: &EventId) -> Result<(), StoreError>;
}

/// A live feed of snapshots for one collection.
///
/// Dropping the subscription (or calling [`Subscription::cancel`]) stops the
/// feed task and closes the channel, so nothing is delivered afterwards.
pub struct Subscription {
    updates: mpsc::Receiver<SubscriptionUpdate>,
    feed: JoinHandle<()>,
}

impl Subscription {
    pub fn new(updates: mpsc::Receiver<SubscriptionUpdate>, feed: JoinHandle<()>) -> Self {
        Self { updates, feed }
    }

    /// `None` once the feed task has ended.
    pub async fn next(&mut self) -> Option<SubscriptionUpdate> {
        self.updates.recv().await
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.updates.close();
        self.feed.abort();
    }
}
