//! Error taxonomy shared by the store, the coordinator and the controller.
//!
//! Every variant is cheap to clone: a single in-flight sync hands the same
//! outcome to all callers that joined it.

use thiserror::Error;

/// Result type alias for feedsync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  /// Transient transport failure. Retried on the next scheduled sync.
  #[error("network error: {0}")]
  Network(String),

  /// The server refused our credentials. Sync stays suspended until re-login.
  #[error("authentication required")]
  Authentication,

  /// The local database could not be opened or initialised.
  #[error("local storage unavailable: {0}")]
  StorageUnavailable(String),

  /// The local database ran out of space.
  #[error("local storage quota exceeded")]
  QuotaExceeded,

  /// Any other local database failure. The transaction was rolled back.
  #[error("storage error: {0}")]
  Storage(String),

  /// The server answered with something we cannot interpret.
  #[error("unexpected server response: {0}")]
  Protocol(String),

  /// A sync is already running and this call carried statuses to push.
  #[error("a sync is already in flight")]
  Busy,

  /// The operation was cancelled explicitly.
  #[error("request aborted")]
  Aborted,
}

/// What the facade should do about a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
  /// Nothing to report (explicit cancellation).
  Ignore,
  /// Keep local state, try again on the next cycle.
  RetryLater,
  /// Connectivity is gone; show the offline banner.
  ShowOffline,
  /// Credentials are no longer valid.
  RequireLogin,
  /// Local persistence is unusable; keep going against the network only.
  NetworkOnly,
}

impl Error {
  pub fn disposition(&self) -> Disposition {
    match self {
      Self::Aborted => Disposition::Ignore,
      Self::Network(_) => Disposition::ShowOffline,
      Self::Authentication => Disposition::RequireLogin,
      Self::StorageUnavailable(_) => Disposition::NetworkOnly,
      Self::QuotaExceeded | Self::Storage(_) | Self::Protocol(_) | Self::Busy => {
        Disposition::RetryLater
      }
    }
  }

  /// Whether the failure leaves local state intact and can simply be retried.
  pub fn is_transient(&self) -> bool {
    matches!(self, Self::Network(_) | Self::Busy | Self::Aborted)
  }
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self {
    match e.sqlite_error_code() {
      Some(rusqlite::ErrorCode::DiskFull) => Error::QuotaExceeded,
      _ => Error::Storage(e.to_string()),
    }
  }
}

impl From<serde_json::Error> for Error {
  fn from(e: serde_json::Error) -> Self {
    Error::Protocol(e.to_string())
  }
}

impl From<reqwest::Error> for Error {
  fn from(e: reqwest::Error) -> Self {
    if let Some(status) = e.status() {
      if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Error::Authentication;
      }
    }
    if e.is_decode() {
      Error::Protocol(e.to_string())
    } else {
      Error::Network(e.to_string())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_disk_full_maps_to_quota() {
    let err = rusqlite::Error::SqliteFailure(
      rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
      None,
    );
    assert_eq!(Error::from(err), Error::QuotaExceeded);
  }

  #[test]
  fn test_dispositions() {
    assert_eq!(Error::Aborted.disposition(), Disposition::Ignore);
    assert_eq!(Error::Authentication.disposition(), Disposition::RequireLogin);
    assert_eq!(
      Error::Network("down".into()).disposition(),
      Disposition::ShowOffline
    );
    assert_eq!(
      Error::StorageUnavailable("nope".into()).disposition(),
      Disposition::NetworkOnly
    );
    assert!(Error::Busy.is_transient());
    assert!(!Error::Authentication.is_transient());
  }
}
