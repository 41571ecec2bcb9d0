//! Fire-and-forget writes.
//!
//! Every operation spawns one store request and returns a ticket right away.
//! The outcome comes back later as a [`WriteCompletion`] on the receiver
//! handed out by [`MutationGateway::new`]. Nothing local changes on success;
//! the next snapshot carries the effect.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use shared::domain::{Estado, EventFields, EventId, EventPatch};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    error::{StoreError, WriteKind},
    store::DocumentStore,
};

#[derive(Debug)]
pub struct WriteCompletion {
    pub ticket: u64,
    pub kind: WriteKind,
    /// Target of the write; for a create, the new id once the store assigned it.
    pub id: Option<EventId>,
    pub result: Result<(), StoreError>,
}

#[derive(Clone)]
pub struct MutationGateway {
    store: Arc<dyn DocumentStore>,
    collection: String,
    completions: mpsc::UnboundedSender<WriteCompletion>,
    next_ticket: Arc<AtomicU64>,
}

impl MutationGateway {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<WriteCompletion>) {
        let (completions, rx) = mpsc::unbounded_channel();
        (
            Self {
                store,
                collection: collection.into(),
                completions,
                next_ticket: Arc::new(AtomicU64::new(1)),
            },
            rx,
        )
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Partial update of `estado` only.
    pub fn set_status(&self, id: EventId, estado: Estado) -> u64 {
        let ticket = self.ticket();
        let (store, collection, completions) = self.handles();
        debug!(%collection, event_id = %id, ?estado, ticket, "queueing status change");
        tokio::spawn(async move {
            let result = store
                .update_partial(&collection, &id, &EventPatch::status(estado))
                .await;
            finish(&completions, ticket, WriteKind::SetStatus, Some(id), result);
        });
        ticket
    }

    pub fn create(&self, fields: EventFields) -> u64 {
        let ticket = self.ticket();
        let (store, collection, completions) = self.handles();
        debug!(%collection, ticket, "queueing create");
        tokio::spawn(async move {
            let (id, result) = match store.insert(&collection, &fields).await {
                Ok(id) => (Some(id), Ok(())),
                Err(err) => (None, Err(err)),
            };
            finish(&completions, ticket, WriteKind::Create, id, result);
        });
        ticket
    }

    /// Full overwrite of every data field.
    pub fn update(&self, id: EventId, fields: EventFields) -> u64 {
        let ticket = self.ticket();
        let (store, collection, completions) = self.handles();
        debug!(%collection, event_id = %id, ticket, "queueing edit");
        tokio::spawn(async move {
            let result = store.update_full(&collection, &id, &fields).await;
            finish(&completions, ticket, WriteKind::Update, Some(id), result);
        });
        ticket
    }

    pub fn delete(&self, id: EventId) -> u64 {
        let ticket = self.ticket();
        let (store, collection, completions) = self.handles();
        debug!(%collection, event_id = %id, ticket, "queueing delete");
        tokio::spawn(async move {
            let result = store.delete_by_id(&collection, &id).await;
            finish(&completions, ticket, WriteKind::Delete, Some(id), result);
        });
        ticket
    }

    fn ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::Relaxed)
    }

    fn handles(
        &self,
    ) -> (
        Arc<dyn DocumentStore>,
        String,
        mpsc::UnboundedSender<WriteCompletion>,
    ) {
        (
            Arc::clone(&self.store),
            self.collection.clone(),
            self.completions.clone(),
        )
    }
}

fn finish(
    completions: &mpsc::UnboundedSender<WriteCompletion>,
    ticket: u64,
    kind: WriteKind,
    id: Option<EventId>,
    result: Result<(), StoreError>,
) {
    if let Err(err) = &result {
        warn!(%kind, ticket, event_id = ?id, error = %err, "write failed");
    }
    // The receiver may be gone after teardown; the write still happened.
    let _ = completions.send(WriteCompletion {
        ticket,
        kind,
        id,
        result,
    });
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
