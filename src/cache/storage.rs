//! SQLite-backed local store.
//!
//! Every mutating operation runs inside one immediate transaction covering the
//! tables it touches. A failed operation rolls back completely, so callers
//! never observe partial effects.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::schema::SCHEMA;
use crate::api::types::{
  Item, ItemStatus, QueuedStatus, StatusChange, StatusName, Stats, Tag, TagColors,
};
use crate::clock::Clock;
use crate::error::{Error, Result};

const RETENTION_PREFERENCE: &str = "retentionDays";

/// Named bookkeeping timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
  /// Server high-water mark last incorporated
  LastItemsUpdate,
  /// Last garbage collection run
  LastCleanup,
  /// Newest datetime among all items ever evicted
  NewestGcedEntry,
}

impl Stamp {
  pub const ALL: [Stamp; 3] = [Self::LastItemsUpdate, Self::LastCleanup, Self::NewestGcedEntry];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::LastItemsUpdate => "lastItemsUpdate",
      Self::LastCleanup => "lastCleanup",
      Self::NewestGcedEntry => "newestGCedEntry",
    }
  }
}

/// Outcome of applying a batch of status updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
  /// Updates whose item was present locally
  pub applied: usize,
  /// Items referenced by the batch but absent from the cache
  pub missing: Vec<i64>,
}

impl StatusReport {
  /// The cache cannot apply these mutations without a full resync.
  pub fn needs_full_resync(&self) -> bool {
    !self.missing.is_empty()
  }
}

/// The durable local copy of the feed.
pub struct LocalStore {
  conn: Mutex<Connection>,
  clock: Arc<dyn Clock>,
  /// Highest item id ever stored; never decreases
  newest_id: AtomicI64,
  default_retention_days: u32,
}

impl LocalStore {
  /// Open (or create) the store at `path`.
  pub fn open(path: &Path, clock: Arc<dyn Clock>, default_retention_days: u32) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        Error::StorageUnavailable(format!("failed to create cache directory: {}", e))
      })?;
    }

    let conn = Connection::open(path).map_err(|e| {
      Error::StorageUnavailable(format!(
        "failed to open cache database at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::with_connection(conn, clock, default_retention_days)
  }

  /// A throwaway store, mainly for tests.
  pub fn open_in_memory(clock: Arc<dyn Clock>, default_retention_days: u32) -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| Error::StorageUnavailable(format!("failed to open in-memory cache: {}", e)))?;
    Self::with_connection(conn, clock, default_retention_days)
  }

  fn with_connection(
    conn: Connection,
    clock: Arc<dyn Clock>,
    default_retention_days: u32,
  ) -> Result<Self> {
    conn
      .execute_batch(SCHEMA)
      .map_err(|e| Error::StorageUnavailable(format!("failed to run cache migrations: {}", e)))?;

    let newest_id: i64 = conn
      .query_row("SELECT COALESCE(MAX(id), 0) FROM entries", [], |row| row.get(0))
      .map_err(|e| Error::StorageUnavailable(format!("failed to read cache: {}", e)))?;

    Ok(Self {
      conn: Mutex::new(conn),
      clock,
      newest_id: AtomicI64::new(newest_id),
      default_retention_days,
    })
  }

  pub(crate) fn now(&self) -> DateTime<Utc> {
    self.clock.now()
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| Error::Storage(format!("lock poisoned: {}", e)))
  }

  /// Run `f` in one immediate transaction; commit only if it succeeds.
  pub(crate) fn transact<R>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<R>) -> Result<R> {
    let mut conn = self.lock()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let result = f(&tx)?;
    tx.commit()?;
    Ok(result)
  }

  pub(crate) fn read<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
    let conn = self.lock()?;
    f(&conn)
  }

  // ==========================================================================
  // Entries
  // ==========================================================================

  /// Highest item id ever stored locally.
  pub fn newest_id(&self) -> i64 {
    self.newest_id.load(Ordering::SeqCst)
  }

  /// Upsert items by id after a routine GC pass.
  ///
  /// When storage is full, collects aggressively and retries once.
  pub fn store_entries(&self, items: &[Item]) -> Result<()> {
    self.gc_entries(false)?;

    match self.upsert_entries(items) {
      Err(Error::QuotaExceeded) => {
        warn!(count = items.len(), "storage quota exceeded, collecting aggressively");
        self.gc_entries(true)?;
        self.upsert_entries(items)
      }
      other => other,
    }
  }

  fn upsert_entries(&self, items: &[Item]) -> Result<()> {
    let batch_max = self.transact(|tx| {
      {
        let mut stmt = tx.prepare_cached(
          "INSERT INTO entries (id, datetime, unread, starred, source, tags, html)
           VALUES (?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(id) DO UPDATE SET
             datetime = excluded.datetime,
             unread = excluded.unread,
             starred = excluded.starred,
             source = excluded.source,
             tags = excluded.tags,
             html = excluded.html",
        )?;
        for item in items {
          let tags = serde_json::to_string(&item.tags)?;
          stmt.execute(params![
            item.id,
            item.datetime.timestamp_millis(),
            item.unread,
            item.starred,
            item.source,
            tags,
            item.html,
          ])?;
        }
      }

      let stats = count_local(tx)?;
      write_stats(tx, &stats)?;

      let max: i64 = tx.query_row("SELECT COALESCE(MAX(id), 0) FROM entries", [], |row| {
        row.get(0)
      })?;
      Ok(max)
    })?;

    self.newest_id.fetch_max(batch_max, Ordering::SeqCst);
    debug!(count = items.len(), newest_id = self.newest_id(), "stored entries");
    Ok(())
  }

  /// Fetch a single cached item.
  pub fn entry(&self, id: i64) -> Result<Option<Item>> {
    self.read(|conn| {
      let item = conn
        .query_row(
          &format!("SELECT {} FROM entries WHERE id = ?", ITEM_COLUMNS),
          params![id],
          row_to_item,
        )
        .optional()?;
      Ok(item)
    })
  }

  /// Number of cached items.
  pub fn entry_count(&self) -> Result<i64> {
    self.read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?))
  }

  /// Patch status fields of locally held items.
  ///
  /// Items missing from the cache are reported, never failed. With
  /// `update_stats`, counters move only for flags whose stored value
  /// actually flips. Re-applying a value an item already holds leaves them
  /// alone, unlike a blind +1/-1 per supplied field. Server snapshots pass
  /// `false` and overwrite counters instead.
  pub fn store_entry_statuses(
    &self,
    updates: &[ItemStatus],
    update_stats: bool,
  ) -> Result<StatusReport> {
    let report = self.transact(|tx| {
      let mut report = StatusReport::default();
      let mut delta: BTreeMap<StatusName, i64> = BTreeMap::new();

      for update in updates {
        let current: Option<(bool, bool)> = tx
          .query_row(
            "SELECT unread, starred FROM entries WHERE id = ?",
            params![update.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;

        let Some((unread, starred)) = current else {
          report.missing.push(update.id);
          continue;
        };

        let mut next = (unread, starred);
        for name in StatusName::ALL {
          let Some(value) = update.get(name) else {
            continue;
          };
          let slot = match name {
            StatusName::Unread => &mut next.0,
            StatusName::Starred => &mut next.1,
          };
          if *slot != value {
            *slot = value;
            *delta.entry(name).or_default() += if value { 1 } else { -1 };
          }
        }

        tx.execute(
          "UPDATE entries SET unread = ?, starred = ? WHERE id = ?",
          params![next.0, next.1, update.id],
        )?;
        report.applied += 1;
      }

      if update_stats && !delta.is_empty() {
        let mut stats = read_stats(tx)?;
        for (name, change) in &delta {
          let key = name.as_str();
          let value = stats.get(key).unwrap_or(0) + change;
          stats.set(key, value.max(0));
        }
        write_stats(tx, &stats)?;
      }

      Ok(report)
    })?;

    if report.needs_full_resync() {
      warn!(missing = ?report.missing, "status update for items not in cache");
    }
    Ok(report)
  }

  // ==========================================================================
  // Pending-mutation queue
  // ==========================================================================

  /// Append user mutations to the pending queue. Returns their queue ids.
  pub fn enqueue_statuses(&self, batch: &[StatusChange]) -> Result<Vec<i64>> {
    let now = self.now().timestamp_millis();
    let ids = self.transact(|tx| {
      let mut stmt = tx.prepare_cached(
        "INSERT INTO status_queue (entry_id, name, value, enqueued_at) VALUES (?, ?, ?, ?)",
      )?;
      let mut ids = Vec::with_capacity(batch.len());
      for change in batch {
        stmt.execute(params![change.entry_id, change.name.as_str(), change.value, now])?;
        ids.push(tx.last_insert_rowid());
      }
      Ok(ids)
    })?;
    debug!(count = ids.len(), "queued status changes");
    Ok(ids)
  }

  /// The whole pending queue, oldest first.
  pub fn queued_statuses(&self) -> Result<Vec<QueuedStatus>> {
    self.read(|conn| {
      let mut stmt = conn.prepare(
        "SELECT queue_id, entry_id, name, value, enqueued_at FROM status_queue ORDER BY queue_id",
      )?;
      let queued = stmt
        .query_map([], |row| {
          let name: String = row.get(2)?;
          let name = StatusName::parse(&name).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
              2,
              Type::Text,
              format!("unknown status name {}", name).into(),
            )
          })?;
          Ok(QueuedStatus {
            queue_id: row.get(0)?,
            change: StatusChange::new(row.get(1)?, name, row.get(3)?),
            enqueued_at: datetime_column(row, 4)?,
          })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(queued)
    })
  }

  /// Remove every queued mutation up to and including `queue_id`.
  ///
  /// Queue ids only grow, so entries added after a drain survive.
  pub fn clear_queued_through(&self, queue_id: i64) -> Result<usize> {
    let removed = self.transact(|tx| {
      let removed = tx.execute(
        "DELETE FROM status_queue WHERE queue_id <= ?",
        params![queue_id],
      )?;
      Ok(removed)
    })?;
    debug!(removed, through = queue_id, "acknowledged queued statuses");
    Ok(removed)
  }

  // ==========================================================================
  // Stamps, stats, tags, preferences
  // ==========================================================================

  pub fn stamp(&self, stamp: Stamp) -> Result<Option<DateTime<Utc>>> {
    self.read(|conn| read_stamp(conn, stamp))
  }

  /// Every stamp with its current value.
  pub fn stamps(&self) -> Result<Vec<(Stamp, Option<DateTime<Utc>>)>> {
    self.read(|conn| {
      Stamp::ALL
        .into_iter()
        .map(|stamp| Ok((stamp, read_stamp(conn, stamp)?)))
        .collect()
    })
  }

  pub fn set_stamp(&self, stamp: Stamp, value: DateTime<Utc>) -> Result<()> {
    self.transact(|tx| write_stamp(tx, stamp, value))
  }

  pub fn stats(&self) -> Result<Stats> {
    self.read(|conn| read_stats(conn))
  }

  /// Overwrite counters with an authoritative snapshot.
  pub fn set_stats(&self, stats: &Stats) -> Result<()> {
    self.transact(|tx| write_stats(tx, stats))
  }

  pub fn tags(&self) -> Result<Vec<Tag>> {
    self.read(|conn| {
      let mut stmt =
        conn.prepare("SELECT name, unread, foreground, background FROM tags ORDER BY name")?;
      let tags = stmt
        .query_map([], |row| {
          Ok(Tag {
            name: row.get(0)?,
            unread_count: row.get(1)?,
            display_colors: TagColors {
              foreground: row.get(2)?,
              background: row.get(3)?,
            },
          })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(tags)
    })
  }

  pub fn replace_tags(&self, tags: &[Tag]) -> Result<()> {
    self.transact(|tx| {
      tx.execute("DELETE FROM tags", [])?;
      let mut stmt = tx.prepare_cached(
        "INSERT OR REPLACE INTO tags (name, unread, foreground, background) VALUES (?, ?, ?, ?)",
      )?;
      for tag in tags {
        stmt.execute(params![
          tag.name,
          tag.unread_count,
          tag.display_colors.foreground,
          tag.display_colors.background,
        ])?;
      }
      Ok(())
    })
  }

  /// Current retention window in days.
  pub fn retention_days(&self) -> Result<u32> {
    self.read(|conn| read_retention(conn, self.default_retention_days))
  }

  pub(crate) fn default_retention_days(&self) -> u32 {
    self.default_retention_days
  }
}

// ============================================================================
// Row helpers
// ============================================================================

pub(crate) const ITEM_COLUMNS: &str = "id, datetime, unread, starred, source, tags, html";

pub(crate) fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
  let tags: String = row.get(5)?;
  let tags: BTreeSet<String> = serde_json::from_str(&tags)
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
  Ok(Item {
    id: row.get(0)?,
    datetime: datetime_column(row, 1)?,
    unread: row.get(2)?,
    starred: row.get(3)?,
    source: row.get(4)?,
    tags,
    html: row.get(6)?,
  })
}

fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
  let millis: i64 = row.get(idx)?;
  DateTime::from_timestamp_millis(millis).ok_or_else(|| {
    rusqlite::Error::FromSqlConversionFailure(
      idx,
      Type::Integer,
      format!("timestamp out of range: {}", millis).into(),
    )
  })
}

pub(crate) fn read_stamp(conn: &Connection, stamp: Stamp) -> Result<Option<DateTime<Utc>>> {
  let millis: Option<i64> = conn
    .query_row(
      "SELECT value FROM stamps WHERE name = ?",
      params![stamp.as_str()],
      |row| row.get(0),
    )
    .optional()?;
  Ok(millis.and_then(DateTime::from_timestamp_millis))
}

pub(crate) fn write_stamp(conn: &Connection, stamp: Stamp, value: DateTime<Utc>) -> Result<()> {
  conn.execute(
    "INSERT OR REPLACE INTO stamps (name, value) VALUES (?, ?)",
    params![stamp.as_str(), value.timestamp_millis()],
  )?;
  Ok(())
}

fn read_stats(conn: &Connection) -> Result<Stats> {
  let mut stmt = conn.prepare("SELECT name, value FROM stats")?;
  let rows = stmt
    .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  let mut stats = Stats::default();
  for (name, value) in rows {
    stats.set(&name, value);
  }
  Ok(stats)
}

fn write_stats(conn: &Connection, stats: &Stats) -> Result<()> {
  let mut stmt = conn.prepare_cached("INSERT OR REPLACE INTO stats (name, value) VALUES (?, ?)")?;
  for name in Stats::NAMES {
    stmt.execute(params![name, stats.get(name).unwrap_or(0)])?;
  }
  Ok(())
}

/// Counters derived from everything held locally.
fn count_local(conn: &Connection) -> Result<Stats> {
  Ok(conn.query_row(
    "SELECT COUNT(*), COALESCE(SUM(unread), 0), COALESCE(SUM(starred), 0) FROM entries",
    [],
    |row| {
      Ok(Stats {
        total: row.get(0)?,
        unread: row.get(1)?,
        starred: row.get(2)?,
      })
    },
  )?)
}

pub(crate) fn read_retention(conn: &Connection, default_days: u32) -> Result<u32> {
  let value: Option<String> = conn
    .query_row(
      "SELECT value FROM preferences WHERE name = ?",
      params![RETENTION_PREFERENCE],
      |row| row.get(0),
    )
    .optional()?;
  match value {
    Some(v) => v
      .parse()
      .map_err(|e| Error::Storage(format!("invalid retention preference {:?}: {}", v, e))),
    None => Ok(default_days),
  }
}

pub(crate) fn write_retention(conn: &Connection, days: u32) -> Result<()> {
  conn.execute(
    "INSERT OR REPLACE INTO preferences (name, value) VALUES (?, ?)",
    params![RETENTION_PREFERENCE, days.to_string()],
  )?;
  info!(days, "retention window changed");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::mock::item;
  use crate::clock::ManualClock;
  use chrono::TimeZone;

  fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::days(n)
  }

  fn store() -> LocalStore {
    let clock = Arc::new(ManualClock::new(day(20)));
    LocalStore::open_in_memory(clock, 10).unwrap()
  }

  /// Store 20 bulky items from day 10 and cap the database one page above
  /// its current size, so the next sizeable batch hits SQLITE_FULL.
  fn full_store(unread: bool) -> LocalStore {
    let store = store();
    let old: Vec<Item> = (1..=20)
      .map(|id| {
        let mut old = item(id, day(10) + chrono::Duration::hours(12));
        old.unread = unread;
        old.html = "x".repeat(2000);
        old
      })
      .collect();
    store.store_entries(&old).unwrap();

    store
      .read(|conn| {
        let pages: i64 = conn.pragma_query_value(None, "page_count", |row| row.get(0))?;
        conn.pragma_update(None, "max_page_count", pages + 1)?;
        Ok(())
      })
      .unwrap();
    store
  }

  fn fresh_batch() -> Vec<Item> {
    (21..=40)
      .map(|id| {
        let mut fresh = item(id, day(19));
        fresh.html = "y".repeat(1500);
        fresh
      })
      .collect()
  }

  #[test]
  fn test_quota_exceeded_collects_aggressively_and_retries() {
    let store = full_store(false);

    store.store_entries(&fresh_batch()).unwrap();

    assert_eq!(store.entry_count().unwrap(), 20);
    assert_eq!(store.entry(1).unwrap(), None);
    assert!(store.entry(40).unwrap().is_some());
    assert_eq!(store.retention_days().unwrap(), 9);
    assert_eq!(store.newest_id(), 40);
  }

  #[test]
  fn test_quota_exceeded_twice_surfaces_error() {
    let store = full_store(true);

    let err = store.store_entries(&fresh_batch()).unwrap_err();

    assert_eq!(err, Error::QuotaExceeded);
    // Unread items survive the aggressive pass, and the failed batch left nothing behind
    assert_eq!(store.entry_count().unwrap(), 20);
    assert_eq!(store.entry(21).unwrap(), None);
    assert_eq!(store.retention_days().unwrap(), 9);
  }

  #[test]
  fn test_store_entries_upserts_and_tracks_newest_id() {
    let store = store();
    store
      .store_entries(&[item(3, day(19)), item(7, day(19))])
      .unwrap();
    assert_eq!(store.newest_id(), 7);

    let mut changed = item(3, day(19));
    changed.unread = true;
    changed.tags.insert("rust".into());
    store.store_entries(&[changed.clone()]).unwrap();

    assert_eq!(store.entry(3).unwrap(), Some(changed));
    assert_eq!(store.entry_count().unwrap(), 2);
    let stats = store.stats().unwrap();
    assert_eq!((stats.total, stats.unread, stats.starred), (2, 1, 0));
  }

  #[test]
  fn test_status_patch_only_touches_supplied_fields() {
    let store = store();
    let mut original = item(1, day(19));
    original.unread = true;
    store.store_entries(&[original]).unwrap();

    let report = store
      .store_entry_statuses(
        &[ItemStatus {
          id: 1,
          starred: Some(true),
          ..Default::default()
        }],
        true,
      )
      .unwrap();
    assert_eq!(report.applied, 1);

    let stored = store.entry(1).unwrap().unwrap();
    assert!(stored.unread);
    assert!(stored.starred);
    assert_eq!(store.stats().unwrap().starred, 1);
  }

  #[test]
  fn test_counters_move_only_on_actual_flips() {
    let store = store();
    let mut original = item(1, day(19));
    original.unread = true;
    store.store_entries(&[original]).unwrap();
    assert_eq!(store.stats().unwrap().unread, 1);

    let again = ItemStatus::from(StatusChange::new(1, StatusName::Unread, true));
    store.store_entry_statuses(&[again], true).unwrap();
    assert_eq!(store.stats().unwrap().unread, 1);

    let read = ItemStatus::from(StatusChange::new(1, StatusName::Unread, false));
    store.store_entry_statuses(&[read], true).unwrap();
    assert_eq!(store.stats().unwrap().unread, 0);
  }

  #[test]
  fn test_missing_item_reported_not_failed() {
    let store = store();
    store.store_entries(&[item(1, day(19))]).unwrap();
    let report = store
      .store_entry_statuses(
        &[
          ItemStatus::from(StatusChange::new(1, StatusName::Unread, true)),
          ItemStatus::from(StatusChange::new(99, StatusName::Unread, true)),
        ],
        true,
      )
      .unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.missing, vec![99]);
    assert!(report.needs_full_resync());
    assert_eq!(store.stats().unwrap().unread, 1);
  }

  #[test]
  fn test_server_updates_leave_counters_alone() {
    let store = store();
    store.store_entries(&[item(1, day(19))]).unwrap();
    store
      .store_entry_statuses(
        &[ItemStatus::from(StatusChange::new(1, StatusName::Unread, true))],
        false,
      )
      .unwrap();
    assert!(store.entry(1).unwrap().unwrap().unread);
    assert_eq!(store.stats().unwrap().unread, 0);
  }

  #[test]
  fn test_queue_clear_keeps_later_entries() {
    let store = store();
    let first = store
      .enqueue_statuses(&[
        StatusChange::new(1, StatusName::Unread, false),
        StatusChange::new(2, StatusName::Starred, true),
      ])
      .unwrap();
    let drained = store.queued_statuses().unwrap();
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].change, StatusChange::new(1, StatusName::Unread, false));
    assert_eq!(drained[1].enqueued_at, day(20));

    store
      .enqueue_statuses(&[StatusChange::new(3, StatusName::Unread, true)])
      .unwrap();
    let removed = store.clear_queued_through(*first.last().unwrap()).unwrap();
    assert_eq!(removed, 2);

    let left = store.queued_statuses().unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].change.entry_id, 3);
  }

  #[test]
  fn test_tags_replaced_wholesale() {
    let store = store();
    let tag = |name: &str, unread| Tag {
      name: name.into(),
      unread_count: unread,
      display_colors: TagColors {
        foreground: "#fff".into(),
        background: "#000".into(),
      },
    };
    store.replace_tags(&[tag("a", 1), tag("b", 2)]).unwrap();
    store.replace_tags(&[tag("c", 3)]).unwrap();
    assert_eq!(store.tags().unwrap(), vec![tag("c", 3)]);
  }

  #[test]
  fn test_reopen_preserves_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(day(20)));
    {
      let store = LocalStore::open(&path, Arc::clone(&clock), 10).unwrap();
      store.store_entries(&[item(42, day(19))]).unwrap();
      store.set_stamp(Stamp::LastItemsUpdate, day(19)).unwrap();
    }
    let store = LocalStore::open(&path, clock, 10).unwrap();
    assert_eq!(store.newest_id(), 42);
    assert_eq!(store.stamp(Stamp::LastItemsUpdate).unwrap(), Some(day(19)));

    let stamps = store.stamps().unwrap();
    assert_eq!(stamps.len(), 3);
    assert_eq!(stamps[0], (Stamp::LastItemsUpdate, Some(day(19))));
    assert_eq!(stamps[2], (Stamp::NewestGcedEntry, None));
  }
}
