use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::api::types::SortOrder;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub server: ServerConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Base URL of the feed reader, e.g. "https://feeds.example.org/"
  pub url: String,
  pub username: Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Page size for list views and for each pulled batch
  #[serde(default = "default_items_per_page")]
  pub items_per_page: u32,
  /// Minimum delay between background syncs
  #[serde(default = "default_interval_secs")]
  pub interval_secs: u64,
  /// Initial retention window; shrinks durably when storage runs out
  #[serde(default = "default_retention_days")]
  pub retention_days: u32,
  #[serde(default)]
  pub order: SortOrder,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      items_per_page: default_items_per_page(),
      interval_secs: default_interval_secs(),
      retention_days: default_retention_days(),
      order: SortOrder::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Set to false to run network-only
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Database location (default: $XDG_DATA_HOME/feedsync/cache.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
    }
  }
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_items_per_page() -> u32 {
  50
}

fn default_interval_secs() -> u64 {
  300
}

fn default_retention_days() -> u32 {
  10
}

fn default_true() -> bool {
  true
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./feedsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/feedsync/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/feedsync/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("feedsync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("feedsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.sync.items_per_page == 0 {
      return Err(eyre!("sync.items_per_page must be at least 1"));
    }
    Ok(config)
  }

  /// Location of the cache database.
  pub fn cache_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.cache.path {
      return Ok(path.clone());
    }
    Ok(Self::data_dir()?.join("cache.db"))
  }

  /// Directory for the cache database and log files.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("feedsync"))
  }

  /// Get the server password from the environment, if set.
  pub fn get_password() -> Option<String> {
    std::env::var("FEEDSYNC_PASSWORD").ok()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_applied() {
    let config = Config::parse("server:\n  url: https://feeds.example.org/\n").unwrap();
    assert_eq!(config.sync.items_per_page, 50);
    assert_eq!(config.sync.interval_secs, 300);
    assert_eq!(config.sync.retention_days, 10);
    assert_eq!(config.sync.order, SortOrder::Descending);
    assert!(config.cache.enabled);
    assert_eq!(config.server.timeout_secs, 30);
  }

  #[test]
  fn test_explicit_values() {
    let yaml = r#"
server:
  url: https://feeds.example.org/
  username: reader
sync:
  items_per_page: 20
  order: ascending
cache:
  enabled: false
  path: /tmp/feeds.db
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.server.username.as_deref(), Some("reader"));
    assert_eq!(config.sync.items_per_page, 20);
    assert_eq!(config.sync.order, SortOrder::Ascending);
    assert!(!config.cache.enabled);
    assert_eq!(config.cache_path().unwrap(), PathBuf::from("/tmp/feeds.db"));
  }

  #[test]
  fn test_zero_page_size_rejected() {
    let yaml = "server:\n  url: https://x/\nsync:\n  items_per_page: 0\n";
    assert!(Config::parse(yaml).is_err());
  }
}
