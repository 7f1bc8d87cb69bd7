//! Network reconciliation with single-flight concurrency control.
//!
//! At most one sync runs at a time. Plain pulls that arrive while one is in
//! flight join it and observe its outcome; calls that carry statuses to push
//! are rejected with [`Error::Busy`] so the caller keeps them queued. Chained
//! calls (pushes from the pending queue) take the slot once the current
//! flight settles.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::state::SyncState;
use crate::api::api_types::{epoch, StatusUpdate, SyncRequest, SyncResponse};
use crate::api::types::{ListQuery, Stats, Tag};
use crate::api::FeedApi;
use crate::cache::result::{ListEntries, ListResult, ListSource};
use crate::cache::{LocalStore, Stamp};
use crate::clock::Clock;
use crate::error::{Error, Result};

type Flight = Shared<BoxFuture<'static, Result<SyncOutcome>>>;

/// What one sync (including chained follow-ups) achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
  /// Server round trips, including follow-ups that drained a backlog
  pub requests: usize,
  pub pushed: usize,
  /// Queue entries cleared after the server acknowledged them
  pub acknowledged: usize,
  pub new_items: usize,
  pub status_updates: usize,
  pub last_update: Option<DateTime<Utc>>,
  pub stats: Option<Stats>,
  pub tags: Option<Vec<Tag>>,
  pub tags_html: Option<String>,
  pub sources_html: Option<String>,
}

/// Arguments of one sync call.
#[derive(Debug, Clone, Default)]
pub struct SyncCall {
  pub statuses: Vec<StatusUpdate>,
  /// Also push the store's pending queue, read when the flight starts and
  /// cleared once the server acknowledged it
  pub from_queue: bool,
  /// Bypass the in-flight rejection and queue behind the current flight
  pub chained: bool,
  /// Items to pull per round trip; capped at twice the page size
  pub how_many: Option<u32>,
}

impl SyncCall {
  pub fn pull() -> Self {
    Self::default()
  }

  pub fn push(statuses: Vec<StatusUpdate>) -> Self {
    Self {
      statuses,
      ..Default::default()
    }
  }

  pub fn from_queue() -> Self {
    Self {
      from_queue: true,
      ..Default::default()
    }
  }

  pub fn chained(mut self) -> Self {
    self.chained = true;
    self
  }

  pub fn how_many(mut self, how_many: u32) -> Self {
    self.how_many = Some(how_many);
    self
  }
}

struct InFlight {
  generation: u64,
  future: Flight,
  /// This flight's task plus every earlier flight it is still queued behind
  chain: Vec<Arc<AbortHandle>>,
}

struct Inner<A> {
  api: A,
  store: Option<Arc<LocalStore>>,
  clock: Arc<dyn Clock>,
  items_per_page: u32,
  state: Mutex<SyncState>,
  flight: Mutex<Option<InFlight>>,
  generation: AtomicU64,
  list_reload: Mutex<Option<AbortHandle>>,
}

/// Drives pulls and pushes against the remote store and writes the results
/// into the local store.
pub struct SyncCoordinator<A> {
  inner: Arc<Inner<A>>,
}

impl<A> Clone for SyncCoordinator<A> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> Error {
  Error::Storage(format!("lock poisoned: {}", e))
}

impl<A: FeedApi> SyncCoordinator<A> {
  /// Create a coordinator. Without a store, pulls only refresh aggregates.
  pub fn new(
    api: A,
    store: Option<Arc<LocalStore>>,
    clock: Arc<dyn Clock>,
    items_per_page: u32,
  ) -> Self {
    let last_update = match &store {
      Some(store) => store.stamp(Stamp::LastItemsUpdate).unwrap_or_else(|e| {
        warn!("failed to read high-water mark: {}", e);
        None
      }),
      None => None,
    };

    Self {
      inner: Arc::new(Inner {
        api,
        store,
        clock,
        items_per_page,
        state: Mutex::new(SyncState::new(last_update)),
        flight: Mutex::new(None),
        generation: AtomicU64::new(0),
        list_reload: Mutex::new(None),
      }),
    }
  }

  /// Snapshot of the sync bookkeeping.
  pub fn state(&self) -> SyncState {
    match self.inner.state.lock() {
      Ok(state) => state.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }

  pub(crate) fn update_state(&self, f: impl FnOnce(&mut SyncState)) {
    if let Ok(mut state) = self.inner.state.lock() {
      f(&mut state);
    }
  }

  pub fn is_in_flight(&self) -> bool {
    self
      .inner
      .flight
      .lock()
      .map(|slot| slot.is_some())
      .unwrap_or(false)
  }

  /// Push `statuses` (if any) and pull everything new.
  pub async fn sync(&self, statuses: Vec<StatusUpdate>, chained: bool) -> Result<SyncOutcome> {
    self
      .sync_with(SyncCall {
        statuses,
        chained,
        ..Default::default()
      })
      .await
  }

  pub async fn sync_with(&self, call: SyncCall) -> Result<SyncOutcome> {
    let flight = {
      let mut slot = self.inner.flight.lock().map_err(poisoned)?;
      let current = slot.as_ref().map(|f| f.future.clone());
      match current {
        Some(current) if !call.chained => {
          if !call.statuses.is_empty() {
            debug!(pending = call.statuses.len(), "sync in flight, rejecting push");
            return Err(Error::Busy);
          }
          debug!("joining sync in flight");
          current
        }
        previous => {
          let mut chain = slot.take().map(|f| f.chain).unwrap_or_default();
          chain.retain(|handle| !handle.is_finished());
          let mut flight = self.launch(call, previous);
          chain.append(&mut flight.chain);
          flight.chain = chain;
          let future = flight.future.clone();
          *slot = Some(flight);
          future
        }
      }
    };
    flight.await
  }

  /// Abort the sync in flight, together with any flight it is queued behind.
  /// Everyone waiting on them sees [`Error::Aborted`].
  pub fn cancel(&self) -> bool {
    let flight = match self.inner.flight.lock() {
      Ok(mut slot) => slot.take(),
      Err(_) => None,
    };
    match flight {
      Some(flight) => {
        info!(
          generation = flight.generation,
          chained = flight.chain.len(),
          "cancelling sync"
        );
        for handle in &flight.chain {
          handle.abort();
        }
        true
      }
      None => false,
    }
  }

  fn launch(&self, call: SyncCall, previous: Option<Flight>) -> InFlight {
    let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let inner = Arc::clone(&self.inner);

    let task = tokio::spawn(async move {
      if let Some(previous) = previous {
        // Only ordering matters here; the previous caller handles its outcome
        let _ = previous.await;
      }
      let result = inner.run(call).await;
      inner.finish(generation, &result);
      result
    });
    let abort = Arc::new(task.abort_handle());

    let future = async move {
      match task.await {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Err(Error::Aborted),
        Err(e) => Err(Error::Storage(format!("sync task failed: {}", e))),
      }
    }
    .boxed()
    .shared();

    InFlight {
      generation,
      future,
      chain: vec![abort],
    }
  }

  /// Fetch one rendered page straight from the server.
  ///
  /// A newer reload cancels an older one still in flight.
  pub async fn reload_list(&self, query: ListQuery) -> Result<ListResult> {
    let inner = Arc::clone(&self.inner);
    let task = tokio::spawn(async move { inner.api.list(query).await });

    if let Ok(mut slot) = self.inner.list_reload.lock() {
      if let Some(previous) = slot.replace(task.abort_handle()) {
        previous.abort();
      }
    }

    let response = match task.await {
      Ok(response) => response,
      Err(e) if e.is_cancelled() => Err(Error::Aborted),
      Err(e) => Err(Error::Network(format!("list task failed: {}", e))),
    };

    let response = match response {
      Ok(response) => response,
      Err(e) => {
        self.inner.note_failure(&e);
        return Err(e);
      }
    };

    let stats = response.stats();
    if let Some(store) = &self.inner.store {
      store.set_stats(&stats)?;
    }
    self.update_state(|state| state.online = true);

    Ok(ListResult {
      entries: ListEntries::Html(response.entries),
      has_more: response.has_more,
      older_entries_online: false,
      source: ListSource::Network,
      stats: Some(stats),
      tags_html: Some(response.tags),
      sources_html: Some(response.sources),
    })
  }
}

impl<A: FeedApi> Inner<A> {
  fn lock_state(&self) -> Result<MutexGuard<'_, SyncState>> {
    self.state.lock().map_err(poisoned)
  }

  fn pull_size(&self, requested: Option<u32>) -> u32 {
    let page = self.items_per_page;
    requested.unwrap_or(page).min(page.saturating_mul(2))
  }

  fn build_request(&self, statuses: Vec<StatusUpdate>, how_many: Option<u32>) -> Result<SyncRequest> {
    let (since, items_statuses) = {
      let state = self.lock_state()?;
      match state.last_update {
        // No baseline yet: there are no deltas to ask for
        None => (epoch(), false),
        Some(_) if state.needs_full_resync => (epoch(), true),
        Some(last) => (last, true),
      }
    };

    let (items_since_id, items_not_before, items_how_many) = match &self.store {
      Some(store) => (
        store.newest_id(),
        store.stamp(Stamp::NewestGcedEntry)?,
        self.pull_size(how_many),
      ),
      None => (0, None, 0),
    };

    Ok(SyncRequest {
      since,
      items_statuses,
      items_since_id,
      items_not_before,
      items_how_many,
      tags: true,
      sources: true,
      updated_statuses: statuses,
    })
  }

  async fn run(&self, call: SyncCall) -> Result<SyncOutcome> {
    let mut outcome = SyncOutcome::default();
    let mut statuses = call.statuses;

    // Read inside the flight so chained flights never push the same rows twice
    let mut drained_through = None;
    if let (true, Some(store)) = (call.from_queue, &self.store) {
      let queued = store.queued_statuses()?;
      drained_through = queued.last().map(|q| q.queue_id);
      statuses.extend(queued.iter().map(StatusUpdate::from));
    }

    loop {
      let request = self.build_request(std::mem::take(&mut statuses), call.how_many)?;
      let known_max = request.items_since_id;
      let full_resync = request.since == epoch() && request.items_statuses;
      outcome.pushed += request.updated_statuses.len();

      debug!(
        since = %request.since,
        since_id = known_max,
        pushing = request.updated_statuses.len(),
        "sync request"
      );
      let response = self.api.sync(request).await?;
      outcome.requests += 1;

      let more = self.apply(response, known_max, full_resync, &mut outcome)?;
      if let (Some(through), Some(store)) = (drained_through.take(), &self.store) {
        outcome.acknowledged = store.clear_queued_through(through)?;
      }
      if !more {
        break;
      }
      debug!("server holds more items, chaining follow-up sync");
    }

    Ok(outcome)
  }

  /// Write one response into the store. Returns whether more items wait.
  fn apply(
    &self,
    response: SyncResponse,
    known_max: i64,
    full_resync: bool,
    outcome: &mut SyncOutcome,
  ) -> Result<bool> {
    let mut more = false;

    if let Some(store) = &self.store {
      if let Some(items) = &response.new_items {
        if !items.is_empty() {
          store.store_entries(items)?;
        }
        outcome.new_items += items.len();
        if let (Some(last_id), Some(batch_max)) =
          (response.last_id, items.iter().map(|i| i.id).max())
        {
          more = last_id > known_max && last_id > batch_max;
        }
      }

      if let Some(updates) = &response.item_updates {
        // Items we no longer hold are expected here; only counters matter
        let report = store.store_entry_statuses(updates, false)?;
        outcome.status_updates += report.applied;
      }

      if let Some(stats) = &response.stats {
        store.set_stats(stats)?;
      }
      if let Some(tags) = &response.tags {
        store.replace_tags(tags)?;
      }
      store.set_stamp(Stamp::LastItemsUpdate, response.last_update)?;
    }

    {
      let mut state = self.lock_state()?;
      state.last_update = Some(response.last_update);
      state.newer_entries_missing = more;
      if full_resync {
        state.needs_full_resync = false;
      }
    }

    outcome.last_update = Some(response.last_update);
    if response.stats.is_some() {
      outcome.stats = response.stats;
    }
    if response.tags.is_some() {
      outcome.tags = response.tags;
    }
    if response.tags_html.is_some() {
      outcome.tags_html = response.tags_html;
    }
    if response.sources_html.is_some() {
      outcome.sources_html = response.sources_html;
    }

    Ok(more)
  }

  fn finish(&self, generation: u64, result: &Result<SyncOutcome>) {
    if let Ok(mut slot) = self.flight.lock() {
      if slot.as_ref().is_some_and(|f| f.generation == generation) {
        *slot = None;
      }
    }

    match result {
      Ok(outcome) => {
        let now = self.clock.now();
        if let Ok(mut state) = self.state.lock() {
          if !state.online {
            info!("back online");
          }
          state.online = true;
          state.last_sync = Some(now);
        }
        info!(
          requests = outcome.requests,
          pushed = outcome.pushed,
          new_items = outcome.new_items,
          "sync finished"
        );
      }
      Err(e) => self.note_failure(e),
    }
  }

  fn note_failure(&self, error: &Error) {
    let Ok(mut state) = self.state.lock() else {
      return;
    };
    match error {
      Error::Network(_) => {
        if state.online {
          warn!("going offline: {}", error);
        }
        state.online = false;
      }
      Error::Authentication => {
        warn!("server rejected credentials, suspending sync");
        state.auth_required = true;
      }
      Error::Aborted => debug!("sync aborted"),
      _ => warn!("sync failed: {}", error),
    }
  }
}
