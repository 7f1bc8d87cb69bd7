//! Scripted stand-in for the remote store, used by unit tests.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

use super::api_types::{ListResponse, SyncRequest, SyncResponse};
use super::client::FeedApi;
use super::types::ListQuery;
use crate::error::Result;

#[derive(Default)]
pub struct ScriptedApi {
  sync_responses: Mutex<VecDeque<Result<SyncResponse>>>,
  list_responses: Mutex<VecDeque<Result<ListResponse>>>,
  sync_requests: Mutex<Vec<SyncRequest>>,
  list_requests: Mutex<Vec<ListQuery>>,
  gate: Mutex<Option<Arc<Semaphore>>>,
  /// Signalled whenever a request reaches the server
  pub started: Notify,
}

impl ScriptedApi {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn push_sync(&self, response: Result<SyncResponse>) {
    self.sync_responses.lock().unwrap().push_back(response);
  }

  pub fn push_list(&self, response: Result<ListResponse>) {
    self.list_responses.lock().unwrap().push_back(response);
  }

  pub fn sync_requests(&self) -> Vec<SyncRequest> {
    self.sync_requests.lock().unwrap().clone()
  }

  pub fn list_requests(&self) -> Vec<ListQuery> {
    self.list_requests.lock().unwrap().clone()
  }

  /// Hold every subsequent request until `release` is called.
  pub fn hold(&self) -> Arc<Semaphore> {
    let gate = Arc::new(Semaphore::new(0));
    *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
    gate
  }

  async fn wait_for_gate(&self) {
    let gate = self.gate.lock().unwrap().clone();
    if let Some(gate) = gate {
      gate.acquire().await.unwrap().forget();
    }
  }
}

pub fn default_update() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn empty_list() -> ListResponse {
  ListResponse {
    all: 0,
    unread: 0,
    starred: 0,
    entries: String::new(),
    tags: String::new(),
    sources: String::new(),
    has_more: false,
    last_update: None,
  }
}

impl FeedApi for Arc<ScriptedApi> {
  async fn sync(&self, request: SyncRequest) -> Result<SyncResponse> {
    self.sync_requests.lock().unwrap().push(request);
    self.started.notify_one();
    self.wait_for_gate().await;
    let next = self.sync_responses.lock().unwrap().pop_front();
    next.unwrap_or_else(|| Ok(SyncResponse::empty(default_update())))
  }

  async fn list(&self, query: ListQuery) -> Result<ListResponse> {
    self.list_requests.lock().unwrap().push(query);
    self.started.notify_one();
    self.wait_for_gate().await;
    let next = self.list_responses.lock().unwrap().pop_front();
    next.unwrap_or_else(|| Ok(empty_list()))
  }
}

/// A read, unstarred item from source 1 at `datetime`.
pub fn item(id: i64, datetime: DateTime<Utc>) -> super::types::Item {
  super::types::Item {
    id,
    datetime,
    unread: false,
    starred: false,
    source: 1,
    tags: Default::default(),
    html: format!("<div id=\"entry{}\"></div>", id),
  }
}
