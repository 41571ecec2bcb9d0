//! Owned application state: snapshot cache, derived view, filter and draft.

use std::str::FromStr;

use shared::domain::{Estado, EventFields, EventId, EventRecord, ParseEstadoError};
use thiserror::Error;

use crate::view::{derive_view, distinct_tracks};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Nombre,
    Expo,
    Hora,
    Track,
    Estado,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown field '{0}'; expected nombre, expo, hora, track or estado")]
pub struct ParseDraftFieldError(pub String);

impl FromStr for DraftField {
    type Err = ParseDraftFieldError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "nombre" | "name" => Ok(DraftField::Nombre),
            "expo" | "speaker" => Ok(DraftField::Expo),
            "hora" | "time" => Ok(DraftField::Hora),
            "track" => Ok(DraftField::Track),
            "estado" | "status" => Ok(DraftField::Estado),
            _ => Err(ParseDraftFieldError(raw.to_string())),
        }
    }
}

/// Staged create/edit form. `editing` set means edit mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub fields: EventFields,
    pub editing: Option<EventId>,
    pub open: bool,
    /// Ticket of the submission whose success closes this form.
    pub submitted: Option<u64>,
}

impl Draft {
    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }
}

#[derive(Debug, Default)]
pub struct DashboardState {
    cache: Vec<EventRecord>,
    tracks: Vec<String>,
    selected_track: Option<String>,
    view: Vec<EventRecord>,
    draft: Draft,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole cache and recomputes tracks and view.
    pub fn apply_snapshot(&mut self, records: Vec<EventRecord>) {
        self.cache = records;
        self.tracks = distinct_tracks(&self.cache);
        self.recompute_view();
    }

    /// Drops everything cached; the view becomes empty.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.tracks.clear();
        self.view.clear();
    }

    /// `None` shows every track. A track missing from the snapshot simply
    /// matches nothing.
    pub fn select_track(&mut self, track: Option<String>) {
        self.selected_track = track;
        self.recompute_view();
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.cache
    }

    pub fn record(&self, id: &EventId) -> Option<&EventRecord> {
        self.cache.iter().find(|record| &record.id == id)
    }

    pub fn tracks(&self) -> &[String] {
        &self.tracks
    }

    pub fn selected_track(&self) -> Option<&str> {
        self.selected_track.as_deref()
    }

    pub fn view(&self) -> &[EventRecord] {
        &self.view
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Opens the form in create mode. An already open create form keeps its
    /// staged fields.
    pub fn open_create(&mut self) {
        if self.draft.open && !self.draft.is_editing() {
            return;
        }
        self.draft = Draft {
            open: true,
            ..Draft::default()
        };
    }

    /// Copies the cached record into the draft. Returns `false` when the id is
    /// not in the current snapshot.
    pub fn open_edit(&mut self, id: &EventId) -> bool {
        let Some(record) = self.record(id) else {
            return false;
        };
        self.draft = Draft {
            fields: record.fields.clone(),
            editing: Some(record.id.clone()),
            open: true,
            submitted: None,
        };
        true
    }

    pub fn set_draft_field(
        &mut self,
        field: DraftField,
        value: &str,
    ) -> Result<(), ParseEstadoError> {
        let fields = &mut self.draft.fields;
        match field {
            DraftField::Nombre => fields.nombre = value.to_string(),
            DraftField::Expo => fields.expo = value.to_string(),
            DraftField::Hora => fields.hora = value.to_string(),
            DraftField::Track => fields.track = value.to_string(),
            DraftField::Estado => fields.estado = Estado::from_str(value)?,
        }
        Ok(())
    }

    pub fn mark_submitted(&mut self, ticket: u64) {
        self.draft.submitted = Some(ticket);
    }

    /// Closes the form and resets the draft to its defaults.
    pub fn close_form(&mut self) {
        self.draft = Draft::default();
    }

    fn recompute_view(&mut self) {
        self.view = derive_view(&self.cache, self.selected_track.as_deref());
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
