//! Retention policy: evicts old, read, unstarred items.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use tracing::{debug, info};

use super::storage::{read_retention, read_stamp, write_retention, write_stamp, LocalStore, Stamp};
use crate::error::Result;

/// Minimum spacing between routine collections.
const GC_INTERVAL_HOURS: i64 = 24;

/// What a collection pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
  /// False when the pass was skipped because one ran recently
  pub ran: bool,
  pub evicted: usize,
  pub retention_days: u32,
  pub newest_gced: Option<DateTime<Utc>>,
}

/// New retention window after storage ran out.
///
/// Keeps strictly fewer days than both the current window and the span still
/// held since the newest eviction. Never negative.
pub fn shrink_retention(current: u32, newest_gced: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
  let current = i64::from(current);
  let kept_days = match newest_gced {
    Some(gced) => (now - gced).num_days(),
    None => current,
  };
  let shrunk = (kept_days - 1).min(current - 1).max(0);
  u32::try_from(shrunk).unwrap_or(0)
}

impl LocalStore {
  /// Evict items older than the retention horizon that are neither unread nor
  /// starred.
  ///
  /// Runs at most once a day unless `aggressive`, which also shrinks the
  /// retention window durably.
  pub fn gc_entries(&self, aggressive: bool) -> Result<GcReport> {
    let now = self.now();
    let default_days = self.default_retention_days();

    let report = self.transact(|tx| {
      let mut retention_days = read_retention(tx, default_days)?;
      let newest_gced = read_stamp(tx, Stamp::NewestGcedEntry)?;

      if !aggressive {
        if let Some(last) = read_stamp(tx, Stamp::LastCleanup)? {
          if now - last < Duration::hours(GC_INTERVAL_HOURS) {
            return Ok(GcReport {
              ran: false,
              evicted: 0,
              retention_days,
              newest_gced,
            });
          }
        }
      }

      if aggressive {
        let shrunk = shrink_retention(retention_days, newest_gced, now);
        if shrunk != retention_days {
          write_retention(tx, shrunk)?;
          retention_days = shrunk;
        }
      }

      let horizon = (now - Duration::days(i64::from(retention_days))).timestamp_millis();
      let evicted_max: Option<i64> = tx.query_row(
        "SELECT MAX(datetime) FROM entries WHERE datetime < ? AND unread = 0 AND starred = 0",
        params![horizon],
        |row| row.get(0),
      )?;
      let evicted = tx.execute(
        "DELETE FROM entries WHERE datetime < ? AND unread = 0 AND starred = 0",
        params![horizon],
      )?;

      let evicted_max = evicted_max.and_then(DateTime::from_timestamp_millis);
      let newest_gced = match (newest_gced, evicted_max) {
        (Some(old), Some(new)) if new > old => Some(new),
        (None, Some(new)) => Some(new),
        (old, _) => old,
      };
      if let Some(newest) = newest_gced {
        write_stamp(tx, Stamp::NewestGcedEntry, newest)?;
      }
      write_stamp(tx, Stamp::LastCleanup, now)?;

      Ok(GcReport {
        ran: true,
        evicted,
        retention_days,
        newest_gced,
      })
    })?;

    if report.ran {
      info!(
        evicted = report.evicted,
        retention_days = report.retention_days,
        aggressive,
        "collected old entries"
      );
    } else {
      debug!("collection skipped, last run under a day ago");
    }
    Ok(report)
  }
}
