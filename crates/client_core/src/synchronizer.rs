use shared::domain::EventRecord;
use tracing::{debug, info, warn};

use crate::{
    error::{DashboardError, StoreError},
    state::DashboardState,
    store::{DocumentStore, Subscription, SubscriptionUpdate},
};

/// Keeps a [`DashboardState`] cache in step with one live collection.
pub struct ViewSynchronizer {
    collection: String,
    subscription: Option<Subscription>,
}

impl ViewSynchronizer {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            subscription: None,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Opens the live subscription, replacing any previous one. On failure the
    /// cache is cleared and nothing is retried.
    pub async fn activate(
        &mut self,
        store: &dyn DocumentStore,
        state: &mut DashboardState,
    ) -> Result<(), DashboardError> {
        self.deactivate();
        match store.subscribe(&self.collection).await {
            Ok(subscription) => {
                info!(collection = %self.collection, "view synchronizer active");
                self.subscription = Some(subscription);
                Ok(())
            }
            Err(err) => Err(self.fail(state, err)),
        }
    }

    /// Waits for the next update. Never resolves while inactive, so it can sit
    /// in a `select!` unconditionally.
    pub async fn next_update(&mut self) -> SubscriptionUpdate {
        match self.subscription.as_mut() {
            Some(subscription) => subscription
                .next()
                .await
                .unwrap_or(SubscriptionUpdate::Failed(StoreError::Closed)),
            None => std::future::pending().await,
        }
    }

    /// Applies one update. A snapshot replaces the cache wholesale; a failure
    /// empties it and ends the subscription.
    pub fn apply(
        &mut self,
        state: &mut DashboardState,
        update: SubscriptionUpdate,
    ) -> Result<(), DashboardError> {
        match update {
            SubscriptionUpdate::Snapshot(records) => {
                self.apply_snapshot(state, records);
                Ok(())
            }
            SubscriptionUpdate::Failed(err) => Err(self.fail(state, err)),
        }
    }

    /// Cancels the subscription. Safe to call when already inactive.
    pub fn deactivate(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
            info!(collection = %self.collection, "view synchronizer cancelled");
        }
    }

    fn apply_snapshot(&self, state: &mut DashboardState, records: Vec<EventRecord>) {
        let count = records.len();
        state.apply_snapshot(records);
        debug!(
            collection = %self.collection,
            records = count,
            visible = state.view().len(),
            "snapshot applied"
        );
    }

    fn fail(&mut self, state: &mut DashboardState, err: StoreError) -> DashboardError {
        warn!(
            collection = %self.collection,
            error = %err,
            "live subscription failed; clearing view"
        );
        self.subscription = None;
        state.clear();
        DashboardError::Subscription(err)
    }
}

impl Drop for ViewSynchronizer {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
#[path = "tests/synchronizer_tests.rs"]
mod tests;
