use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use feedsync::api::types::{ItemFilter, ListQuery, SeekKey, StatusChange, StatusName, ViewType};
use feedsync::api::HttpApi;
use feedsync::cache::ListEntries;
use feedsync::clock::{Clock, SystemClock};
use feedsync::config::Config;
use feedsync::controller::CacheController;
use feedsync::{Error, LocalStore};

#[derive(Parser, Debug)]
#[command(name = "feedsync")]
#[command(about = "Offline-capable sync client for a feed reader")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/feedsync/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Increase log verbosity (-v info, -vv debug, -vvv trace)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  /// Write logs to a daily file under the data directory instead of stderr
  #[arg(long, global = true)]
  log_file: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Push queued changes and pull new items
  Sync {
    /// Ignore the sync interval
    #[arg(long)]
    force: bool,
  },
  /// Show one page of items
  List(ListArgs),
  /// Change the status of an item
  Mark(MarkArgs),
  /// Evict old read items from the cache
  Gc {
    /// Shrink the retention window and collect now
    #[arg(long)]
    aggressive: bool,
  },
  /// Show cache and sync state
  Status,
}

#[derive(ClapArgs, Debug)]
struct ListArgs {
  #[arg(long = "type", value_enum, default_value_t = ViewArg::Newest)]
  view: ViewArg,
  #[arg(long)]
  search: Option<String>,
  #[arg(long)]
  tag: Option<String>,
  #[arg(long)]
  source: Option<i64>,
  /// Continue after the item with this datetime (RFC 3339)
  #[arg(long, requires = "from_id")]
  from_datetime: Option<DateTime<Utc>>,
  #[arg(long, requires = "from_datetime")]
  from_id: Option<i64>,
  /// Page size (default: sync.items_per_page)
  #[arg(long)]
  items: Option<u32>,
  /// Always include these item ids
  #[arg(long = "pin")]
  pinned: Vec<i64>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ViewArg {
  Newest,
  Unread,
  Starred,
}

impl From<ViewArg> for ViewType {
  fn from(view: ViewArg) -> Self {
    match view {
      ViewArg::Newest => ViewType::Newest,
      ViewArg::Unread => ViewType::Unread,
      ViewArg::Starred => ViewType::Starred,
    }
  }
}

#[derive(ClapArgs, Debug)]
#[group(skip)]
struct MarkArgs {
  id: i64,
  #[arg(long, group = "change")]
  read: bool,
  #[arg(long, group = "change")]
  unread: bool,
  #[arg(long, group = "change")]
  star: bool,
  #[arg(long, group = "change")]
  unstar: bool,
}

impl MarkArgs {
  fn change(&self) -> Result<StatusChange> {
    let (name, value) = match (self.read, self.unread, self.star, self.unstar) {
      (true, ..) => (StatusName::Unread, false),
      (_, true, ..) => (StatusName::Unread, true),
      (_, _, true, _) => (StatusName::Starred, true),
      (.., true) => (StatusName::Starred, false),
      _ => return Err(eyre!("Pass one of --read, --unread, --star or --unstar")),
    };
    Ok(StatusChange::new(self.id, name, value))
  }
}

fn init_tracing(verbose: u8, log_file: bool) -> Result<Option<WorkerGuard>> {
  // Honor RUST_LOG if set, otherwise use verbosity flag
  let filter = if std::env::var("RUST_LOG").is_ok() {
    EnvFilter::from_default_env()
  } else {
    match verbose {
      0 => EnvFilter::new("warn"),
      1 => EnvFilter::new("feedsync=info"),
      2 => EnvFilter::new("debug,rusqlite=info,hyper=info,reqwest=info"),
      _ => EnvFilter::new("trace"),
    }
  };

  if log_file {
    let dir = Config::data_dir()?;
    std::fs::create_dir_all(&dir)
      .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
    let appender = tracing_appender::rolling::daily(dir, "feedsync.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(writer)
      .with_ansi(false)
      .init();
    Ok(Some(guard))
  } else {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .init();
    Ok(None)
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_tracing(args.verbose, args.log_file)?;

  let config = Config::load(args.config.as_deref())?;
  let clock: Arc<dyn Clock> = Arc::new(SystemClock);

  let store = if config.cache.enabled {
    LocalStore::open(&config.cache_path()?, Arc::clone(&clock), config.sync.retention_days)
  } else {
    Err(Error::StorageUnavailable("cache disabled in configuration".into()))
  };
  let api = HttpApi::new(&config.server, Config::get_password())?;
  let controller = CacheController::new(api, store, clock, &config.sync);

  match args.command {
    Command::Sync { force } => match controller.sync(force).await? {
      Some(outcome) => {
        println!(
          "synced: {} new, {} status updates, {} pushed ({} requests)",
          outcome.new_items, outcome.status_updates, outcome.pushed, outcome.requests
        );
        if let Some(stats) = outcome.stats {
          println!("total {} / unread {} / starred {}", stats.total, stats.unread, stats.starred);
        }
      }
      None => println!("up to date, skipped"),
    },

    Command::List(list) => {
      let filter = ItemFilter {
        view: list.view.into(),
        search: list.search,
        tag: list.tag,
        source: list.source,
        pinned: list.pinned,
      };
      let page_size = list.items.unwrap_or(config.sync.items_per_page);
      let mut query = ListQuery::first_page(filter, config.sync.order, page_size);
      if let (Some(datetime), Some(id)) = (list.from_datetime, list.from_id) {
        query = query.after(SeekKey { datetime, id });
      }

      let page = controller.reload_list(query).await?;
      match &page.entries {
        ListEntries::Items(items) => {
          for item in items {
            println!(
              "{:>8}  {}  {}{}  source {}",
              item.id,
              item.datetime.to_rfc3339(),
              if item.unread { 'U' } else { '-' },
              if item.starred { '*' } else { '-' },
              item.source
            );
          }
        }
        ListEntries::Html(html) => println!("{}", html),
      }
      println!("-- {:?}, more: {}", page.source, page.has_more);
      if page.older_entries_online {
        println!("-- older items are only available online");
      }
    }

    Command::Mark(mark) => {
      let outcome = controller.mark_statuses(&[mark.change()?]).await?;
      if !outcome.report.missing.is_empty() {
        println!("item {} is not cached; a full resync is scheduled", mark.id);
      }
      if outcome.pushed {
        println!("marked item {}", mark.id);
      } else {
        println!("marked item {} locally; queued for the next sync", mark.id);
      }
    }

    Command::Gc { aggressive } => {
      let store = controller
        .store()
        .ok_or_else(|| eyre!("No local store; nothing to collect"))?;
      let report = store.gc_entries(aggressive)?;
      if report.ran {
        println!(
          "evicted {} items, retention {} days",
          report.evicted, report.retention_days
        );
      } else {
        println!("collected less than a day ago, skipped");
      }
    }

    Command::Status => {
      println!("mode: {:?}", controller.mode());
      let state = controller.state();
      println!("online: {}", state.online);
      if let Some(store) = controller.store() {
        let stats = store.stats()?;
        println!(
          "items: {} cached, total {} / unread {} / starred {}",
          store.entry_count()?,
          stats.total,
          stats.unread,
          stats.starred
        );
        println!("queued changes: {}", store.queued_statuses()?.len());
        println!("retention: {} days", store.retention_days()?);
        for (stamp, value) in store.stamps()? {
          match value {
            Some(value) => println!("{}: {}", stamp.as_str(), value.to_rfc3339()),
            None => println!("{}: never", stamp.as_str()),
          }
        }
        for tag in store.tags()? {
          println!("tag {} ({} unread)", tag.name, tag.unread_count);
        }
      }
    }
  }

  Ok(())
}
