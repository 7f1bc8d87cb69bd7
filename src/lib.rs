//! Offline-capable sync and cache engine for a feed reader.
//!
//! Three services cooperate:
//! - [`LocalStore`] keeps a durable copy of items, queued status changes and
//!   bookkeeping, and enforces retention.
//! - [`SyncCoordinator`] reconciles with the server, one flight at a time.
//! - [`CacheController`] decides whether and from where to answer requests.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod sync;

pub use cache::LocalStore;
pub use controller::CacheController;
pub use error::{Error, Result};
pub use sync::SyncCoordinator;
