//! Live document store service for the session board.
//!
//! Writes arrive over HTTP; every successful write re-lists the touched
//! collection and pushes the full snapshot to the WebSocket subscribers of
//! that collection.

pub mod api;
pub mod app_state;
pub mod config;

pub use api::{http::build_router, ApiContext};
pub use app_state::AppState;
