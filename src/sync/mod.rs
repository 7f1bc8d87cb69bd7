//! Reconciliation with the remote feed server.

mod coordinator;
mod state;

pub use coordinator::{SyncCall, SyncCoordinator, SyncOutcome};
pub use state::SyncState;
