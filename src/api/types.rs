use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A feed item as held in the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
  /// Server-assigned, never reused, increases over the lifetime of the store
  pub id: i64,
  pub datetime: DateTime<Utc>,
  pub unread: bool,
  pub starred: bool,
  pub source: i64,
  #[serde(default)]
  pub tags: BTreeSet<String>,
  /// Pre-rendered display fragment
  #[serde(default)]
  pub html: String,
}

impl Item {
  pub fn status(&self, name: StatusName) -> bool {
    match name {
      StatusName::Unread => self.unread,
      StatusName::Starred => self.starred,
    }
  }
}

/// The two user-mutable item flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusName {
  Unread,
  Starred,
}

impl StatusName {
  pub const ALL: [StatusName; 2] = [StatusName::Unread, StatusName::Starred];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Unread => "unread",
      Self::Starred => "starred",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "unread" => Some(Self::Unread),
      "starred" => Some(Self::Starred),
      _ => None,
    }
  }
}

impl fmt::Display for StatusName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A single status change requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
  pub entry_id: i64,
  pub name: StatusName,
  pub value: bool,
}

impl StatusChange {
  pub fn new(entry_id: i64, name: StatusName, value: bool) -> Self {
    Self {
      entry_id,
      name,
      value,
    }
  }
}

/// A status change waiting in the pending-mutation queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedStatus {
  pub queue_id: i64,
  pub change: StatusChange,
  pub enqueued_at: DateTime<Utc>,
}

/// Status fields for one item, each present only when it changed.
///
/// Used both for server-confirmed updates and for optimistic local ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemStatus {
  pub id: i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unread: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub starred: Option<bool>,
}

impl ItemStatus {
  pub fn get(&self, name: StatusName) -> Option<bool> {
    match name {
      StatusName::Unread => self.unread,
      StatusName::Starred => self.starred,
    }
  }

  pub fn set(&mut self, name: StatusName, value: bool) {
    match name {
      StatusName::Unread => self.unread = Some(value),
      StatusName::Starred => self.starred = Some(value),
    }
  }
}

impl From<StatusChange> for ItemStatus {
  fn from(change: StatusChange) -> Self {
    let mut status = ItemStatus {
      id: change.entry_id,
      ..Default::default()
    };
    status.set(change.name, change.value);
    status
  }
}

/// Aggregate counters shown next to the filter buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stats {
  pub total: i64,
  pub unread: i64,
  pub starred: i64,
}

impl Stats {
  pub const NAMES: [&'static str; 3] = ["total", "unread", "starred"];

  pub fn get(&self, name: &str) -> Option<i64> {
    match name {
      "total" => Some(self.total),
      "unread" => Some(self.unread),
      "starred" => Some(self.starred),
      _ => None,
    }
  }

  pub fn set(&mut self, name: &str, value: i64) {
    match name {
      "total" => self.total = value,
      "unread" => self.unread = value,
      "starred" => self.starred = value,
      _ => {}
    }
  }
}

/// Tag metadata for the navigation panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
  #[serde(rename = "tag")]
  pub name: String,
  #[serde(rename = "unread", default)]
  pub unread_count: i64,
  #[serde(rename = "color", default)]
  pub display_colors: TagColors,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagColors {
  #[serde(default)]
  pub foreground: String,
  #[serde(default)]
  pub background: String,
}

/// Which slice of items a list view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
  #[default]
  Newest,
  Unread,
  Starred,
}

impl ViewType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Newest => "newest",
      Self::Unread => "unread",
      Self::Starred => "starred",
    }
  }

  /// Views whose items are never evicted, so the cache always holds all of them.
  pub fn is_fully_resident(&self) -> bool {
    matches!(self, Self::Unread | Self::Starred)
  }
}

/// The active list filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemFilter {
  pub view: ViewType,
  pub search: Option<String>,
  pub tag: Option<String>,
  pub source: Option<i64>,
  /// Items that must appear regardless of the predicate (e.g. deep links)
  pub pinned: Vec<i64>,
}

impl ItemFilter {
  pub fn view(view: ViewType) -> Self {
    Self {
      view,
      ..Default::default()
    }
  }

  /// Whether the local indexes can answer this filter.
  pub fn is_locally_indexed(&self) -> bool {
    self.search.is_none() && self.tag.is_none() && self.source.is_none()
  }

  pub fn matches(&self, item: &Item) -> bool {
    let in_view = match self.view {
      ViewType::Newest => true,
      ViewType::Unread => item.unread,
      ViewType::Starred => item.starred,
    };
    in_view
      && self.tag.as_ref().map_or(true, |t| item.tags.contains(t))
      && self.source.map_or(true, |s| item.source == s)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  Ascending,
  #[default]
  Descending,
}

/// Continuation point of a list: the `(datetime, id)` of the last row shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekKey {
  pub datetime: DateTime<Utc>,
  pub id: i64,
}

impl From<&Item> for SeekKey {
  fn from(item: &Item) -> Self {
    Self {
      datetime: item.datetime,
      id: item.id,
    }
  }
}

/// One page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
  pub filter: ItemFilter,
  pub order: SortOrder,
  pub seek: Option<SeekKey>,
  pub page_size: u32,
}

impl ListQuery {
  pub fn first_page(filter: ItemFilter, order: SortOrder, page_size: u32) -> Self {
    Self {
      filter,
      order,
      seek: None,
      page_size,
    }
  }

  pub fn after(mut self, seek: SeekKey) -> Self {
    self.seek = Some(seek);
    self
  }
}
