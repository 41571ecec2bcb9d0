//! Operator commands typed into `board watch`.

use client_core::{state::ParseDraftFieldError, Intent};
use shared::domain::{EventId, ParseEstadoError};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  track <name>|all        filter by track
  status <id> <estado>    change status (not_started, in_progress, finished)
  new                     open the create form
  edit <id>               open the edit form for an event
  set <field> <value>     set nombre, expo, hora, track or estado on the form
  save                    submit the form
  cancel                  close the form
  delete <id>             delete an event
  quit                    leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Intent(Intent),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCommandError {
    #[error("unknown command '{0}'; type 'help'")]
    Unknown(String),

    #[error("'{command}' needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error(transparent)]
    Estado(#[from] ParseEstadoError),

    #[error(transparent)]
    Field(#[from] ParseDraftFieldError),
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, ParseCommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = split_word(line);

    let intent = match word.to_lowercase().as_str() {
        "track" => match rest {
            "" => return Err(missing("track", "a track name or 'all'")),
            "all" | "*" => Intent::SelectTrack(None),
            track => Intent::SelectTrack(Some(track.to_string())),
        },
        "status" => {
            let (id, estado) = split_word(rest);
            if id.is_empty() || estado.is_empty() {
                return Err(missing("status", "an id and an estado"));
            }
            Intent::SetStatus {
                id: EventId::new(id),
                estado: estado.parse()?,
            }
        }
        "new" => Intent::OpenCreate,
        "edit" => Intent::OpenEdit(event_id("edit", rest)?),
        "set" => {
            let (field, value) = split_word(rest);
            if field.is_empty() || value.is_empty() {
                return Err(missing("set", "a field and a value"));
            }
            Intent::SetDraftField {
                field: field.parse()?,
                value: value.to_string(),
            }
        }
        "save" | "submit" => Intent::Submit,
        "cancel" => Intent::CancelForm,
        "delete" | "rm" => Intent::Delete(event_id("delete", rest)?),
        "help" | "?" => return Ok(Some(Command::Help)),
        "quit" | "exit" | "q" => return Ok(Some(Command::Quit)),
        _ => return Err(ParseCommandError::Unknown(word.to_string())),
    };
    Ok(Some(Command::Intent(intent)))
}

fn split_word(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

fn event_id(command: &'static str, rest: &str) -> Result<EventId, ParseCommandError> {
    match split_word(rest).0 {
        "" => Err(missing(command, "an event id")),
        id => Ok(EventId::new(id)),
    }
}

fn missing(command: &'static str, argument: &'static str) -> ParseCommandError {
    ParseCommandError::MissingArgument { command, argument }
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
