//! List results and where they came from.

use crate::api::types::{Item, Stats};

/// Rows of a list page: structured items from the cache, or markup rendered
/// by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntries {
  Items(Vec<Item>),
  Html(String),
}

impl ListEntries {
  /// Number of structured items; server-rendered pages report zero.
  pub fn item_count(&self) -> usize {
    match self {
      Self::Items(items) => items.len(),
      Self::Html(_) => 0,
    }
  }
}

/// One page of the item list, including metadata about the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResult {
  pub entries: ListEntries,
  pub has_more: bool,
  /// Older matching items were evicted locally and live only on the server
  pub older_entries_online: bool,
  /// Where the page came from
  pub source: ListSource,
  /// Counters to refresh alongside the page, when the source had them
  pub stats: Option<Stats>,
  pub tags_html: Option<String>,
  pub sources_html: Option<String>,
}

impl ListResult {
  /// A page read from the local store.
  pub fn from_cache(items: Vec<Item>, has_more: bool, older_entries_online: bool, offline: bool) -> Self {
    Self {
      entries: ListEntries::Items(items),
      has_more,
      older_entries_online,
      source: if offline {
        ListSource::Offline
      } else {
        ListSource::Cache
      },
      stats: None,
      tags_html: None,
      sources_html: None,
    }
  }
}

/// Indicates where a list page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSource {
  /// Rendered by the server
  Network,
  /// Read from the local store while online
  Cache,
  /// Offline mode - network unavailable, serving cached data
  Offline,
}
