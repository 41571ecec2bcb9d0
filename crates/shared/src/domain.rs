use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_COLLECTION: &str = "devfest";

/// Store-assigned document id. Opaque to everything but the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estado {
    #[default]
    NotStarted,
    InProgress,
    Finished,
}

impl Estado {
    pub fn label(self) -> &'static str {
        match self {
            Estado::NotStarted => "No ha comenzado",
            Estado::InProgress => "En proceso",
            Estado::Finished => "Finalizado",
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Estado::NotStarted => "not_started",
            Estado::InProgress => "in_progress",
            Estado::Finished => "finished",
        }
    }
}

impl fmt::Display for Estado {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown estado '{0}'; expected one of not_started, in_progress, finished")]
pub struct ParseEstadoError(pub String);

impl FromStr for Estado {
    type Err = ParseEstadoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_lowercase();
        let estado = match normalized.as_str() {
            "not_started" | "not-started" | "pending" | "no ha comenzado" => Estado::NotStarted,
            "in_progress" | "in-progress" | "live" | "en proceso" => Estado::InProgress,
            "finished" | "done" | "finalizado" => Estado::Finished,
            _ => return Err(ParseEstadoError(raw.to_string())),
        };
        Ok(estado)
    }
}

/// The five data fields of a session. `Default` is the empty draft.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventFields {
    pub nombre: String,
    pub expo: String,
    pub hora: String,
    pub track: String,
    #[serde(default)]
    pub estado: Estado,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    #[serde(flatten)]
    pub fields: EventFields,
}

impl EventRecord {
    pub fn new(id: EventId, fields: EventFields) -> Self {
        Self { id, fields }
    }

    pub fn track(&self) -> &str {
        &self.fields.track
    }

    pub fn estado(&self) -> Estado {
        self.fields.estado
    }
}

/// Partial update body. Only `Some` fields are written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hora: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estado: Option<Estado>,
}

impl EventPatch {
    pub fn status(estado: Estado) -> Self {
        Self {
            estado: Some(estado),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nombre.is_none()
            && self.expo.is_none()
            && self.hora.is_none()
            && self.track.is_none()
            && self.estado.is_none()
    }

    pub fn apply_to(&self, fields: &mut EventFields) {
        if let Some(v) = &self.nombre {
            fields.nombre = v.clone();
        }
        if let Some(v) = &self.expo {
            fields.expo = v.clone();
        }
        if let Some(v) = &self.hora {
            fields.hora = v.clone();
        }
        if let Some(v) = &self.track {
            fields.track = v.clone();
        }
        if let Some(v) = self.estado {
            fields.estado = v;
        }
    }
}

pub fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estado_parses_wire_names_labels_and_aliases() {
        assert_eq!("in_progress".parse::<Estado>(), Ok(Estado::InProgress));
        assert_eq!("En proceso".parse::<Estado>(), Ok(Estado::InProgress));
        assert_eq!("done".parse::<Estado>(), Ok(Estado::Finished));
        assert_eq!(" pending ".parse::<Estado>(), Ok(Estado::NotStarted));
        assert!("Atrasado".parse::<Estado>().is_err());
    }

    #[test]
    fn estado_serializes_snake_case() {
        let json = serde_json::to_string(&Estado::InProgress).expect("serialize");
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn record_flattens_fields_on_the_wire() {
        let record = EventRecord::new(
            EventId::new("abc"),
            EventFields {
                nombre: "Keynote".into(),
                expo: "Ada".into(),
                hora: "09:00".into(),
                track: "Main".into(),
                estado: Estado::Finished,
            },
        );
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["id"], "abc");
        assert_eq!(value["track"], "Main");
        assert_eq!(value["estado"], "finished");
    }

    #[test]
    fn fields_without_estado_default_to_not_started() {
        let fields: EventFields = serde_json::from_str(
            r#"{"nombre":"n","expo":"e","hora":"h","track":"t"}"#,
        )
        .expect("deserialize");
        assert_eq!(fields.estado, Estado::NotStarted);
    }

    #[test]
    fn status_patch_only_touches_estado() {
        let mut fields = EventFields {
            nombre: "Talk".into(),
            track: "A".into(),
            ..EventFields::default()
        };
        EventPatch::status(Estado::InProgress).apply_to(&mut fields);
        assert_eq!(fields.estado, Estado::InProgress);
        assert_eq!(fields.nombre, "Talk");
        assert_eq!(fields.track, "A");
    }

    #[test]
    fn collection_names_are_restricted() {
        assert!(is_valid_collection_name("devfest"));
        assert!(is_valid_collection_name("devfest-2024_a"));
        assert!(!is_valid_collection_name(""));
        assert!(!is_valid_collection_name("../etc"));
        assert!(!is_valid_collection_name(&"x".repeat(65)));
    }
}
