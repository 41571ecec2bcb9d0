use std::fmt;

use shared::error::ApiError;
use thiserror::Error;

/// Failure of a single call against the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store url: {0}")]
    InvalidUrl(String),

    #[error("store unreachable: {0}")]
    Transport(String),

    #[error("store rejected request with status {status}: {error}")]
    Rejected { status: u16, error: ApiError },

    #[error("store reported an error: {0}")]
    Api(ApiError),

    #[error("invalid store response: {0}")]
    Decode(String),

    #[error("subscription closed by store")]
    Closed,
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    SetStatus,
    Create,
    Update,
    Delete,
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteKind::SetStatus => "status change",
            WriteKind::Create => "create",
            WriteKind::Update => "edit",
            WriteKind::Delete => "delete",
        })
    }
}

/// The two recoverable failure kinds the dashboard surfaces. Neither is
/// retried.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("live subscription failed: {0}")]
    Subscription(#[source] StoreError),

    #[error("{kind} failed: {source}")]
    Write {
        kind: WriteKind,
        #[source]
        source: StoreError,
    },
}
