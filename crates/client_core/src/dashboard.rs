//! The dashboard controller.
//!
//! One task owns the [`DashboardState`] and reacts to three inputs: operator
//! intents, snapshot pushes and write completions. After each one it hands
//! the renderer a fresh [`ViewFrame`]. Writes run elsewhere and never touch
//! the state, so no locking is involved.

use std::sync::Arc;

use shared::domain::{Estado, EventId, EventRecord};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    error::{DashboardError, WriteKind},
    gateway::{MutationGateway, WriteCompletion},
    state::{DashboardState, Draft, DraftField},
    store::{DocumentStore, SubscriptionUpdate},
    synchronizer::ViewSynchronizer,
};

/// Operator actions forwarded by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SelectTrack(Option<String>),
    SetStatus { id: EventId, estado: Estado },
    OpenCreate,
    OpenEdit(EventId),
    SetDraftField { field: DraftField, value: String },
    Submit,
    CancelForm,
    Delete(EventId),
}

/// Read-only picture of the state handed to the renderer.
pub struct ViewFrame<'a> {
    pub collection: &'a str,
    pub live: bool,
    pub tracks: &'a [String],
    pub selected_track: Option<&'a str>,
    pub rows: &'a [EventRecord],
    pub draft: &'a Draft,
}

pub trait Renderer {
    fn render(&mut self, frame: &ViewFrame<'_>);

    /// Called for recovered failures. The default ignores them.
    fn report(&mut self, _error: &DashboardError) {}
}

pub struct Dashboard<R: Renderer> {
    store: Arc<dyn DocumentStore>,
    state: DashboardState,
    synchronizer: ViewSynchronizer,
    gateway: MutationGateway,
    completions: mpsc::UnboundedReceiver<WriteCompletion>,
    renderer: R,
}

impl<R: Renderer> Dashboard<R> {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>, renderer: R) -> Self {
        let collection = collection.into();
        let (gateway, completions) = MutationGateway::new(Arc::clone(&store), collection.clone());
        Self {
            store,
            state: DashboardState::new(),
            synchronizer: ViewSynchronizer::new(collection),
            gateway,
            completions,
            renderer,
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn is_live(&self) -> bool {
        self.synchronizer.is_active()
    }

    /// Opens the live subscription and renders the (still empty) view.
    pub async fn activate(&mut self) {
        let store = Arc::clone(&self.store);
        if let Err(err) = self.synchronizer.activate(store.as_ref(), &mut self.state).await {
            self.renderer.report(&err);
        }
        self.render();
    }

    pub fn deactivate(&mut self) {
        self.synchronizer.deactivate();
    }

    pub fn handle_intent(&mut self, intent: Intent) {
        debug!(?intent, "intent");
        match intent {
            Intent::SelectTrack(track) => self.state.select_track(track),
            Intent::SetStatus { id, estado } => {
                self.gateway.set_status(id, estado);
            }
            Intent::OpenCreate => self.state.open_create(),
            Intent::OpenEdit(id) => {
                if !self.state.open_edit(&id) {
                    warn!(event_id = %id, "cannot edit: event not in current snapshot");
                }
            }
            Intent::SetDraftField { field, value } => {
                if let Err(err) = self.state.set_draft_field(field, &value) {
                    warn!(?field, error = %err, "draft field rejected");
                }
            }
            Intent::Submit => self.submit(),
            Intent::CancelForm => self.state.close_form(),
            Intent::Delete(id) => {
                self.gateway.delete(id);
            }
        }
        self.render();
    }

    pub fn handle_update(&mut self, update: SubscriptionUpdate) {
        if let Err(err) = self.synchronizer.apply(&mut self.state, update) {
            self.renderer.report(&err);
        }
        self.render();
    }

    pub fn handle_completion(&mut self, completion: WriteCompletion) {
        let WriteCompletion {
            ticket,
            kind,
            id,
            result,
        } = completion;
        match result {
            Ok(()) => {
                debug!(%kind, ticket, event_id = ?id, "write completed");
                let closes_form = matches!(kind, WriteKind::Create | WriteKind::Update)
                    && self.state.draft().submitted == Some(ticket);
                if closes_form {
                    self.state.close_form();
                }
            }
            Err(source) => {
                // The form, if any, stays open with its draft.
                self.renderer.report(&DashboardError::Write { kind, source });
            }
        }
        self.render();
    }

    /// Waits for the next snapshot push or write completion and applies it.
    pub async fn pump(&mut self) {
        tokio::select! {
            update = self.synchronizer.next_update() => self.handle_update(update),
            Some(completion) = self.completions.recv() => self.handle_completion(completion),
        }
    }

    /// Runs until the intent channel closes, then cancels the subscription.
    pub async fn run(&mut self, mut intents: mpsc::Receiver<Intent>) {
        if !self.synchronizer.is_active() {
            self.activate().await;
        }
        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(intent) => self.handle_intent(intent),
                    None => break,
                },
                update = self.synchronizer.next_update() => self.handle_update(update),
                Some(completion) = self.completions.recv() => self.handle_completion(completion),
            }
        }
        self.deactivate();
        info!(collection = %self.synchronizer.collection(), "dashboard stopped");
    }

    fn submit(&mut self) {
        let draft = self.state.draft();
        if !draft.open {
            debug!("submit ignored: form is closed");
            return;
        }
        let fields = draft.fields.clone();
        let ticket = match draft.editing.clone() {
            Some(id) => self.gateway.update(id, fields),
            None => self.gateway.create(fields),
        };
        self.state.mark_submitted(ticket);
    }

    fn render(&mut self) {
        let frame = ViewFrame {
            collection: self.synchronizer.collection(),
            live: self.synchronizer.is_active(),
            tracks: self.state.tracks(),
            selected_track: self.state.selected_track(),
            rows: self.state.view(),
            draft: self.state.draft(),
        };
        self.renderer.render(&frame);
    }
}

#[cfg(test)]
#[path = "tests/dashboard_tests.rs"]
mod tests;
