//! Pushing queued status changes to the server.

use tracing::info;

use super::storage::LocalStore;
use crate::api::FeedApi;
use crate::error::Result;
use crate::sync::{SyncCall, SyncCoordinator, SyncOutcome};

impl LocalStore {
  /// Push the pending queue in one chained sync.
  ///
  /// The queue is read when the flight starts and cleared only after the
  /// server acknowledged the push, up to the last entry that was sent.
  /// Changes queued while the request was in flight stay for the next
  /// round, and an overlapping call finds the rows already gone. With
  /// nothing queued this is a plain pull.
  ///
  /// `coordinator` must have been built over this store.
  pub async fn send_new_statuses<A: FeedApi>(
    &self,
    coordinator: &SyncCoordinator<A>,
  ) -> Result<SyncOutcome> {
    let outcome = coordinator
      .sync_with(SyncCall::from_queue().chained())
      .await?;

    let remaining = self.queued_statuses()?.len();
    coordinator.update_state(|state| state.needs_sync = remaining > 0);
    if outcome.acknowledged > 0 {
      info!(pushed = outcome.acknowledged, remaining, "queued statuses acknowledged");
    }

    Ok(outcome)
  }
}
