//! Client side of the session board: a live view over one collection of
//! session records plus the writes an operator can issue against it.

pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod remote;
pub mod state;
pub mod store;
pub mod synchronizer;
pub mod view;

pub use dashboard::{Dashboard, Intent, Renderer, ViewFrame};
pub use error::{DashboardError, StoreError, WriteKind};
pub use gateway::{MutationGateway, WriteCompletion};
pub use memory::MemoryStore;
pub use remote::RemoteStore;
pub use state::{DashboardState, Draft, DraftField};
pub use store::{DocumentStore, Subscription, SubscriptionUpdate};
pub use synchronizer::ViewSynchronizer;
pub use view::{derive_view, distinct_tracks};
