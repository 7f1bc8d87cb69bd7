//! Durable local store for offline use.
//!
//! This module holds the cached items and everything needed to reconcile
//! them with the server later:
//! - Items keyed by id, indexed by datetime and status flags
//! - A queue of status changes waiting to be pushed
//! - Bookkeeping stamps, counters, tags and the retention preference
//! - Seek pagination that stops at evicted history

mod outbox;
mod paging;
pub mod result;
mod retention;
mod schema;
mod storage;

pub use paging::LocalPage;
pub use result::{ListEntries, ListResult, ListSource};
pub use retention::{shrink_retention, GcReport};
pub use storage::{LocalStore, Stamp, StatusReport};
