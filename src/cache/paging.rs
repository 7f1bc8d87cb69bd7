//! Seek pagination over the local item index.
//!
//! Pages are ordered by `(datetime, id)` and continue from the key of the
//! last row shown, so inserts or evictions elsewhere never shift a page
//! boundary that was already handed out.

use rusqlite::params_from_iter;
use rusqlite::types::Value;
use tracing::debug;

use super::storage::{read_stamp, row_to_item, LocalStore, Stamp, ITEM_COLUMNS};
use crate::api::types::{Item, ListQuery, SortOrder, ViewType};
use crate::error::Result;

/// One page read from the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalPage {
  pub items: Vec<Item>,
  pub has_more: bool,
  /// The scan reached evicted history; older items exist only on the server
  pub older_entries_online: bool,
}

impl LocalStore {
  /// Read one page for the view predicate of `query`.
  ///
  /// Only the view (newest/unread/starred) is indexed locally; search, tag
  /// and source filters are answered by the server.
  pub fn reload_list(&self, query: &ListQuery) -> Result<LocalPage> {
    let filter = &query.filter;
    let page_size = query.page_size as usize;

    let (rows, newest_gced) = self.read(|conn| {
      let newest_gced = read_stamp(conn, Stamp::NewestGcedEntry)?;

      let mut args: Vec<Value> = Vec::new();
      let predicate = match filter.view {
        ViewType::Newest => "1".to_string(),
        ViewType::Unread => "unread = 1".to_string(),
        ViewType::Starred => "starred = 1".to_string(),
      };
      let predicate = if filter.pinned.is_empty() {
        predicate
      } else {
        let placeholders = vec!["?"; filter.pinned.len()].join(", ");
        args.extend(filter.pinned.iter().map(|id| Value::Integer(*id)));
        format!("({} OR id IN ({}))", predicate, placeholders)
      };

      let (cmp, direction) = match query.order {
        SortOrder::Descending => ("<", "DESC"),
        SortOrder::Ascending => (">", "ASC"),
      };
      let seek = match query.seek {
        Some(key) => {
          args.push(Value::Integer(key.datetime.timestamp_millis()));
          args.push(Value::Integer(key.id));
          format!("AND (datetime, id) {} (?, ?)", cmp)
        }
        None => String::new(),
      };
      args.push(Value::Integer(page_size as i64 + 1));

      let sql = format!(
        "SELECT {} FROM entries WHERE {} {} ORDER BY datetime {dir}, id {dir} LIMIT ?",
        ITEM_COLUMNS,
        predicate,
        seek,
        dir = direction
      );
      let mut stmt = conn.prepare(&sql)?;
      let rows = stmt
        .query_map(params_from_iter(args), row_to_item)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok((rows, newest_gced))
    })?;

    // Descending scans of views that evictions can thin out must stop at
    // evicted history instead of silently ending the list there.
    let watch_horizon =
      query.order == SortOrder::Descending && !filter.view.is_fully_resident() && newest_gced.is_some();

    let mut page = LocalPage::default();
    for item in rows {
      let pinned_only = !filter.matches(&item);
      if watch_horizon && !pinned_only && newest_gced.is_some_and(|gced| item.datetime < gced) {
        page.older_entries_online = true;
        page.has_more = true;
        break;
      }
      if page.items.len() == page_size {
        page.has_more = true;
        break;
      }
      page.items.push(item);
    }

    if watch_horizon && !page.has_more {
      page.older_entries_online = true;
      page.has_more = true;
    }

    debug!(
      view = filter.view.as_str(),
      rows = page.items.len(),
      has_more = page.has_more,
      older_online = page.older_entries_online,
      "local page"
    );
    Ok(page)
  }
}
