//! Serde types matching the sync and list endpoints.
//!
//! Optional response members are modelled as `Option`, so "absent" and
//! "present but empty" stay distinguishable after deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Item, ItemStatus, ListQuery, QueuedStatus, Stats, StatusChange, Tag};

/// The server clock's zero, sent as `since` before any sync has completed.
pub fn epoch() -> DateTime<Utc> {
  DateTime::<Utc>::UNIX_EPOCH
}

// ============================================================================
// items/sync
// ============================================================================

/// One pushed status change, as the server expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
  pub id: i64,
  pub datetime: DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub unread: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub starred: Option<bool>,
}

impl StatusUpdate {
  /// A change made at `datetime`.
  pub fn new(change: StatusChange, datetime: DateTime<Utc>) -> Self {
    let status = ItemStatus::from(change);
    Self {
      id: status.id,
      datetime,
      unread: status.unread,
      starred: status.starred,
    }
  }
}

impl From<&QueuedStatus> for StatusUpdate {
  fn from(queued: &QueuedStatus) -> Self {
    Self::new(queued.change, queued.enqueued_at)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
  pub since: DateTime<Utc>,
  /// Ask for status deltas of already-known items
  pub items_statuses: bool,
  pub items_since_id: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub items_not_before: Option<DateTime<Utc>>,
  pub items_how_many: u32,
  pub tags: bool,
  pub sources: bool,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub updated_statuses: Vec<StatusUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
  pub last_update: DateTime<Utc>,
  #[serde(default)]
  pub new_items: Option<Vec<Item>>,
  #[serde(default)]
  pub last_id: Option<i64>,
  #[serde(default)]
  pub item_updates: Option<Vec<ItemStatus>>,
  #[serde(default)]
  pub stats: Option<Stats>,
  #[serde(default)]
  pub tags: Option<Vec<Tag>>,
  #[serde(default, rename = "tagshtml")]
  pub tags_html: Option<String>,
  #[serde(default, rename = "sourceshtml")]
  pub sources_html: Option<String>,
}

impl SyncResponse {
  /// A response carrying nothing but a new high-water mark.
  pub fn empty(last_update: DateTime<Utc>) -> Self {
    Self {
      last_update,
      new_items: None,
      last_id: None,
      item_updates: None,
      stats: None,
      tags: None,
      tags_html: None,
      sources_html: None,
    }
  }
}

// ============================================================================
// Plain list endpoint
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
  pub all: i64,
  pub unread: i64,
  pub starred: i64,
  /// Rendered entries
  pub entries: String,
  #[serde(default)]
  pub tags: String,
  #[serde(default)]
  pub sources: String,
  #[serde(default)]
  pub has_more: bool,
  #[serde(default)]
  pub last_update: Option<DateTime<Utc>>,
}

impl ListResponse {
  pub fn stats(&self) -> Stats {
    Stats {
      total: self.all,
      unread: self.unread,
      starred: self.starred,
    }
  }
}

/// Query string for the list endpoint.
pub fn list_params(query: &ListQuery) -> Vec<(&'static str, String)> {
  let filter = &query.filter;
  let mut params = vec![
    ("type", filter.view.as_str().to_string()),
    ("items", query.page_size.to_string()),
  ];
  if let Some(search) = &filter.search {
    params.push(("search", search.clone()));
  }
  if let Some(tag) = &filter.tag {
    params.push(("tag", tag.clone()));
  }
  if let Some(source) = filter.source {
    params.push(("source", source.to_string()));
  }
  if let Some(seek) = query.seek {
    params.push(("fromDatetime", seek.datetime.to_rfc3339()));
    params.push(("fromId", seek.id.to_string()));
  }
  for id in &filter.pinned {
    params.push(("extraIds[]", id.to_string()));
  }
  params
}
