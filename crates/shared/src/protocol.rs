use serde::{Deserialize, Serialize};

use crate::{
    domain::{EventId, EventRecord},
    error::ApiError,
};

/// Path segments of the collection listing. Clients push these onto a base
/// url so ids and names are percent-encoded as single segments.
pub fn events_path(collection: &str) -> [&str; 3] {
    ["collections", collection, "events"]
}

pub fn event_path<'a>(collection: &'a str, id: &'a EventId) -> [&'a str; 4] {
    ["collections", collection, "events", id.as_str()]
}

pub fn subscribe_path(collection: &str) -> [&str; 3] {
    ["collections", collection, "ws"]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: EventId,
}

/// Messages pushed over the live subscription socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full point-in-time listing of a collection, in document order.
    Snapshot {
        collection: String,
        records: Vec<EventRecord>,
    },
    Error(ApiError),
}
