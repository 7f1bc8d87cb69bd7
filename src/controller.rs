//! Top-level facade: decides whether and from where to satisfy a request.
//!
//! The controller owns the sync coordinator and, when one could be opened,
//! the local store. It rate-limits background syncs, applies user mutations
//! optimistically and picks the local or network path for list pages.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::api_types::StatusUpdate;
use crate::api::types::{ItemStatus, ListQuery, StatusChange};
use crate::api::FeedApi;
use crate::cache::{ListResult, LocalStore, StatusReport};
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::{Disposition, Error, Result};
use crate::sync::{SyncCoordinator, SyncOutcome, SyncState};

/// Whether a local store backs this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
  /// Store could not be opened; every request goes to the network
  NoLocalStore,
  LocalStoreReady,
}

/// Result of marking items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkOutcome {
  /// Local application of the changes
  pub report: StatusReport,
  /// Whether the changes already reached the server
  pub pushed: bool,
}

pub struct CacheController<A> {
  coordinator: SyncCoordinator<A>,
  store: Option<Arc<LocalStore>>,
  clock: Arc<dyn Clock>,
  sync_interval: Duration,
}

impl<A: FeedApi> CacheController<A> {
  /// Build the controller around whatever the store initialisation produced.
  ///
  /// A failed store selects network-only mode for the rest of the session.
  pub fn new(api: A, store: Result<LocalStore>, clock: Arc<dyn Clock>, config: &SyncConfig) -> Self {
    let store = match store {
      Ok(store) => Some(Arc::new(store)),
      Err(e) => {
        warn!("local store unavailable, running network-only: {}", e);
        None
      }
    };
    let coordinator = SyncCoordinator::new(
      api,
      store.clone(),
      Arc::clone(&clock),
      config.items_per_page,
    );
    let interval_secs = i64::try_from(config.interval_secs).unwrap_or(i64::MAX);

    Self {
      coordinator,
      store,
      clock,
      sync_interval: Duration::seconds(interval_secs),
    }
  }

  pub fn mode(&self) -> StoreMode {
    match self.store {
      Some(_) => StoreMode::LocalStoreReady,
      None => StoreMode::NoLocalStore,
    }
  }

  pub fn store(&self) -> Option<&Arc<LocalStore>> {
    self.store.as_ref()
  }

  pub fn coordinator(&self) -> &SyncCoordinator<A> {
    &self.coordinator
  }

  pub fn state(&self) -> SyncState {
    self.coordinator.state()
  }

  pub fn is_online(&self) -> bool {
    self.state().online
  }

  // ==========================================================================
  // Connectivity
  // ==========================================================================

  /// Record a connectivity change reported by the environment.
  pub fn set_online(&self, online: bool) {
    self.coordinator.update_state(|state| {
      if state.online != online {
        info!(online, "connectivity changed");
      }
      state.online = online;
    });
  }

  /// Come back online and sync straight away.
  pub async fn reconnect(&self) -> Result<Option<SyncOutcome>> {
    self.set_online(true);
    self.sync(true).await
  }

  /// Lift the suspension left by rejected credentials and sync.
  pub async fn resume_after_login(&self) -> Result<Option<SyncOutcome>> {
    self.coordinator.update_state(|state| state.auth_required = false);
    info!("credentials refreshed, resuming sync");
    self.sync(true).await
  }

  // ==========================================================================
  // Sync
  // ==========================================================================

  /// Push pending changes and pull new items.
  ///
  /// Without `force` this is a no-op while offline or when the last sync is
  /// more recent than the configured interval. Returns `None` when nothing
  /// ran or the sync was cancelled.
  pub async fn sync(&self, force: bool) -> Result<Option<SyncOutcome>> {
    let state = self.state();
    if state.auth_required {
      debug!("sync suspended until login");
      return Err(Error::Authentication);
    }

    if !force {
      if !state.online {
        debug!("offline, skipping background sync");
        return Ok(None);
      }
      if let Some(last) = state.last_sync {
        if self.clock.now() - last <= self.sync_interval {
          debug!(last_sync = %last, "synced recently, skipping");
          return Ok(None);
        }
      }
    }

    let result = match &self.store {
      Some(store) => store.send_new_statuses(&self.coordinator).await,
      None => self.coordinator.sync(Vec::new(), false).await,
    };

    match result {
      Ok(outcome) => Ok(Some(outcome)),
      Err(e) if e.disposition() == Disposition::Ignore => {
        debug!("sync cancelled");
        Ok(None)
      }
      Err(e) => Err(e),
    }
  }

  /// Apply status changes locally, queue them and try to push them.
  ///
  /// Network trouble leaves the changes queued for the next sync and is not
  /// an error here. Without a local store the changes are pushed directly.
  pub async fn mark_statuses(&self, changes: &[StatusChange]) -> Result<MarkOutcome> {
    let Some(store) = &self.store else {
      let now = self.clock.now();
      let batch = changes
        .iter()
        .map(|change| StatusUpdate::new(*change, now))
        .collect();
      self.coordinator.sync(batch, true).await?;
      return Ok(MarkOutcome {
        report: StatusReport::default(),
        pushed: true,
      });
    };

    let updates: Vec<ItemStatus> = changes.iter().copied().map(ItemStatus::from).collect();
    let report = store.store_entry_statuses(&updates, true)?;
    store.enqueue_statuses(changes)?;

    let resync = report.needs_full_resync();
    self.coordinator.update_state(|state| {
      state.needs_sync = true;
      if resync {
        state.needs_full_resync = true;
      }
    });

    let state = self.state();
    if !state.online || state.auth_required {
      debug!(count = changes.len(), "changes queued until back online");
      return Ok(MarkOutcome {
        report,
        pushed: false,
      });
    }

    match store.send_new_statuses(&self.coordinator).await {
      Ok(_) => Ok(MarkOutcome {
        report,
        pushed: true,
      }),
      Err(e) => match e.disposition() {
        Disposition::Ignore | Disposition::RetryLater | Disposition::ShowOffline => {
          debug!("push deferred: {}", e);
          Ok(MarkOutcome {
            report,
            pushed: false,
          })
        }
        _ => Err(e),
      },
    }
  }

  // ==========================================================================
  // Listing
  // ==========================================================================

  /// Fetch one page of the item list.
  ///
  /// The local store answers when it holds everything the filter needs.
  /// The server answers when there is no store, when the filter uses
  /// criteria that are not indexed locally, when newer items are still
  /// missing locally, or when a backward scan ran into evicted history.
  pub async fn reload_list(&self, query: ListQuery) -> Result<ListResult> {
    let state = self.state();
    let store = match &self.store {
      Some(store) if query.filter.is_locally_indexed() && !state.newer_entries_missing => store,
      _ => return self.reload_from_network(query).await,
    };

    let page = store.reload_list(&query)?;
    if page.older_entries_online && page.items.is_empty() && state.online {
      debug!("local history exhausted, continuing from the server");
      return self.reload_from_network(query).await;
    }

    let mut result = ListResult::from_cache(
      page.items,
      page.has_more,
      page.older_entries_online,
      !state.online,
    );
    result.stats = Some(store.stats()?);
    Ok(result)
  }

  async fn reload_from_network(&self, query: ListQuery) -> Result<ListResult> {
    let fallback = query.clone();
    match self.coordinator.reload_list(query).await {
      Ok(result) => Ok(result),
      Err(e) if e.disposition() == Disposition::ShowOffline => {
        let Some(store) = self.store.as_ref().filter(|_| fallback.filter.is_locally_indexed()) else {
          return Err(e);
        };
        warn!("list request failed, serving cached page: {}", e);
        let page = store.reload_list(&fallback)?;
        let mut result = ListResult::from_cache(page.items, page.has_more, page.older_entries_online, true);
        result.stats = Some(store.stats()?);
        Ok(result)
      }
      Err(e) => Err(e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::api_types::{epoch, SyncResponse};
  use crate::api::mock::{default_update, empty_list, item, ScriptedApi};
  use crate::api::types::{ItemFilter, SortOrder, StatusName, ViewType};
  use crate::cache::{ListEntries, ListSource, Stamp};
  use crate::clock::ManualClock;
  use chrono::{DateTime, TimeZone, Utc};

  fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
  }

  struct Fixture {
    clock: Arc<ManualClock>,
    api: Arc<ScriptedApi>,
    controller: CacheController<Arc<ScriptedApi>>,
  }

  fn setup_with(store: bool) -> Fixture {
    let clock = Arc::new(ManualClock::new(day(20)));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let api = ScriptedApi::new();
    let store = if store {
      LocalStore::open_in_memory(Arc::clone(&dyn_clock), 10)
    } else {
      Err(Error::StorageUnavailable("disabled".into()))
    };
    let controller = CacheController::new(Arc::clone(&api), store, dyn_clock, &SyncConfig::default());
    Fixture {
      clock,
      api,
      controller,
    }
  }

  fn setup() -> Fixture {
    setup_with(true)
  }

  fn store(f: &Fixture) -> &Arc<LocalStore> {
    f.controller.store().unwrap()
  }

  fn newest(size: u32) -> ListQuery {
    ListQuery::first_page(ItemFilter::view(ViewType::Newest), SortOrder::Descending, size)
  }

  #[tokio::test]
  async fn test_background_sync_rate_limited() {
    let f = setup();
    assert!(f.controller.sync(false).await.unwrap().is_some());
    assert!(f.controller.sync(false).await.unwrap().is_none());
    assert_eq!(f.api.sync_requests().len(), 1);

    f.clock.advance(Duration::minutes(4));
    assert!(f.controller.sync(false).await.unwrap().is_none());
    assert!(f.controller.sync(true).await.unwrap().is_some());
    assert_eq!(f.api.sync_requests().len(), 2);

    f.clock.advance(Duration::minutes(6));
    assert!(f.controller.sync(false).await.unwrap().is_some());
    assert_eq!(f.api.sync_requests().len(), 3);
  }

  #[tokio::test]
  async fn test_offline_skips_background_sync_until_reconnect() {
    let f = setup();
    f.controller.set_online(false);
    assert!(f.controller.sync(false).await.unwrap().is_none());
    assert!(f.api.sync_requests().is_empty());

    assert!(f.controller.reconnect().await.unwrap().is_some());
    assert!(f.controller.is_online());
    assert_eq!(f.api.sync_requests().len(), 1);
  }

  #[tokio::test]
  async fn test_rejected_credentials_suspend_sync() {
    let f = setup();
    f.api.push_sync(Err(Error::Authentication));
    assert_eq!(f.controller.sync(true).await, Err(Error::Authentication));
    assert_eq!(f.controller.sync(true).await, Err(Error::Authentication));
    assert_eq!(f.api.sync_requests().len(), 1);

    assert!(f.controller.resume_after_login().await.unwrap().is_some());
    assert_eq!(f.api.sync_requests().len(), 2);
    assert!(!f.controller.state().auth_required);
  }

  #[tokio::test]
  async fn test_store_failure_selects_network_only() {
    let f = setup_with(false);
    assert_eq!(f.controller.mode(), StoreMode::NoLocalStore);

    f.controller.sync(true).await.unwrap();
    let request = &f.api.sync_requests()[0];
    assert_eq!(request.items_how_many, 0);
    assert_eq!(request.items_since_id, 0);

    let page = f.controller.reload_list(newest(10)).await.unwrap();
    assert_eq!(page.source, ListSource::Network);
    assert_eq!(f.api.list_requests().len(), 1);
  }

  #[tokio::test]
  async fn test_mark_applies_optimistically_and_pushes() {
    let f = setup();
    store(&f).store_entries(&[item(5, day(19))]).unwrap();

    let outcome = f
      .controller
      .mark_statuses(&[StatusChange::new(5, StatusName::Starred, true)])
      .await
      .unwrap();
    assert!(outcome.pushed);
    assert_eq!(outcome.report.applied, 1);

    assert!(store(&f).entry(5).unwrap().unwrap().starred);
    assert_eq!(store(&f).stats().unwrap().starred, 1);
    assert!(store(&f).queued_statuses().unwrap().is_empty());
    assert_eq!(f.api.sync_requests()[0].updated_statuses.len(), 1);
    assert!(!f.controller.state().needs_sync);
  }

  #[tokio::test]
  async fn test_mark_while_offline_stays_queued() {
    let f = setup();
    store(&f).store_entries(&[item(5, day(19))]).unwrap();
    f.controller.set_online(false);

    let outcome = f
      .controller
      .mark_statuses(&[StatusChange::new(5, StatusName::Unread, true)])
      .await
      .unwrap();
    assert!(!outcome.pushed);
    assert!(store(&f).entry(5).unwrap().unwrap().unread);
    assert_eq!(store(&f).queued_statuses().unwrap().len(), 1);
    assert!(f.controller.state().needs_sync);
    assert!(f.api.sync_requests().is_empty());

    f.controller.reconnect().await.unwrap();
    assert!(store(&f).queued_statuses().unwrap().is_empty());
    assert_eq!(f.api.sync_requests()[0].updated_statuses[0].id, 5);
  }

  #[tokio::test]
  async fn test_mark_network_failure_keeps_changes() {
    let f = setup();
    store(&f).store_entries(&[item(5, day(19))]).unwrap();
    f.api.push_sync(Err(Error::Network("unreachable".into())));

    let outcome = f
      .controller
      .mark_statuses(&[StatusChange::new(5, StatusName::Unread, true)])
      .await
      .unwrap();
    assert!(!outcome.pushed);
    assert!(!f.controller.is_online());
    assert_eq!(store(&f).queued_statuses().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_mark_on_missing_item_requests_full_resync() {
    let f = setup();
    f.controller.sync(true).await.unwrap();
    f.controller.set_online(false);

    let outcome = f
      .controller
      .mark_statuses(&[StatusChange::new(77, StatusName::Starred, true)])
      .await
      .unwrap();
    assert_eq!(outcome.report.missing, vec![77]);
    assert!(f.controller.state().needs_full_resync);

    f.controller.reconnect().await.unwrap();
    let request = &f.api.sync_requests()[1];
    assert_eq!(request.since, epoch());
    assert!(request.items_statuses);
    assert!(!f.controller.state().needs_full_resync);
  }

  #[tokio::test]
  async fn test_list_routes_by_filter() {
    let f = setup();
    store(&f)
      .store_entries(&[item(1, day(18)), item(2, day(19))])
      .unwrap();

    let page = f.controller.reload_list(newest(10)).await.unwrap();
    assert_eq!(page.source, ListSource::Cache);
    assert_eq!(page.entries.item_count(), 2);
    assert!(f.api.list_requests().is_empty());

    let mut filter = ItemFilter::view(ViewType::Newest);
    filter.search = Some("rust".into());
    let mut listed = empty_list();
    listed.entries = "<div id=\"entry9\"></div>".into();
    listed.has_more = true;
    f.api.push_list(Ok(listed));

    let page = f
      .controller
      .reload_list(ListQuery::first_page(filter, SortOrder::Descending, 10))
      .await
      .unwrap();
    assert_eq!(page.source, ListSource::Network);
    assert!(page.has_more);
    assert_eq!(page.entries, ListEntries::Html("<div id=\"entry9\"></div>".into()));
  }

  #[tokio::test]
  async fn test_list_goes_remote_while_newer_items_missing() {
    let f = setup();
    let mut first = SyncResponse::empty(default_update());
    first.new_items = Some(vec![item(1, day(19))]);
    first.last_id = Some(500);
    f.api.push_sync(Ok(first));
    // The follow-up that would drain the backlog fails
    f.api.push_sync(Err(Error::Network("reset".into())));
    assert!(f.controller.sync(true).await.is_err());
    assert!(f.controller.state().newer_entries_missing);

    let page = f.controller.reload_list(newest(10)).await.unwrap();
    assert_eq!(page.source, ListSource::Network);
    assert_eq!(f.api.list_requests().len(), 1);
  }

  #[tokio::test]
  async fn test_list_continues_remote_past_evicted_history() {
    let f = setup();
    let store = store(&f);
    store.store_entries(&[item(1, day(2)), item(2, day(19))]).unwrap();
    f.clock.advance(Duration::days(2));
    store.gc_entries(false).unwrap();
    assert_eq!(store.stamp(Stamp::NewestGcedEntry).unwrap(), Some(day(2)));

    let first = f.controller.reload_list(newest(10)).await.unwrap();
    assert_eq!(first.source, ListSource::Cache);
    assert!(first.older_entries_online);
    assert!(first.has_more);

    let ListEntries::Items(items) = &first.entries else {
      panic!("expected local items");
    };
    let next = newest(10).after(items.last().unwrap().into());
    let second = f.controller.reload_list(next).await.unwrap();
    assert_eq!(second.source, ListSource::Network);
  }

  #[tokio::test]
  async fn test_list_falls_back_to_cache_when_network_fails() {
    let f = setup();
    store(&f).store_entries(&[item(1, day(19))]).unwrap();
    f.controller
      .coordinator()
      .update_state(|s| s.newer_entries_missing = true);
    f.api.push_list(Err(Error::Network("unreachable".into())));

    let page = f.controller.reload_list(newest(10)).await.unwrap();
    assert_eq!(page.source, ListSource::Offline);
    assert_eq!(page.entries.item_count(), 1);
    assert!(!f.controller.is_online());
  }
}
