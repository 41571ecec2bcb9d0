use shared::protocol::ServerEvent;
use tokio::sync::{broadcast, Mutex};

use crate::api::ApiContext;

pub struct AppState {
    pub api: ApiContext,
    pub events: broadcast::Sender<ServerEvent>,
    /// Held from a write until its snapshot is on `events`, and while a new
    /// subscriber takes its first listing, so pushes never go out of order.
    pub publish: Mutex<()>,
}

impl AppState {
    pub fn new(api: ApiContext, snapshot_channel_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(snapshot_channel_capacity);
        Self {
            api,
            events,
            publish: Mutex::new(()),
        }
    }
}
