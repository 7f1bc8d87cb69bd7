use chrono::{DateTime, Utc};

/// Process-wide sync bookkeeping. Not persisted, apart from `last_update`
/// which is mirrored into the `lastItemsUpdate` stamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
  /// Server-clock high-water mark
  pub last_update: Option<DateTime<Utc>>,
  /// Wall-clock time of the last successful sync
  pub last_sync: Option<DateTime<Utc>>,
  pub online: bool,
  /// Local mutations are waiting to be pushed
  pub needs_sync: bool,
  /// A status update met an item we do not hold; re-pull all statuses
  pub needs_full_resync: bool,
  /// The server holds newer items than the cache has drained
  pub newer_entries_missing: bool,
  /// The server rejected our credentials; sync stays off until re-login
  pub auth_required: bool,
}

impl SyncState {
  pub fn new(last_update: Option<DateTime<Utc>>) -> Self {
    Self {
      last_update,
      online: true,
      ..Default::default()
    }
  }
}
