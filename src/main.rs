use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use assetcache::cache::{CacheStorage, SqliteStorage};
use assetcache::config::Config;
use assetcache::fetch::Request;
use assetcache::host::Host;
use assetcache::network::HttpNetwork;
use assetcache::notify::LogNotifier;
use assetcache::worker::CacheFallbackManager;
use reqwest::Method;

#[derive(Parser, Debug)]
#[command(name = "assetcache")]
#[command(about = "Cache-first asset manager with offline fallback")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/assetcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Path to the cache database (default: $XDG_DATA_HOME/assetcache/cache.db)
  #[arg(long)]
  db: Option<PathBuf>,

  /// Origin to resolve relative URLs against
  #[arg(long)]
  origin: Option<String>,

  /// Enable debug logging
  #[arg(short, long)]
  verbose: bool,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Install the current version: pre-cache static assets, then activate
  Install,
  /// Activate the current version, deleting every other cache
  Activate,
  /// Answer a request cache-first
  Fetch {
    /// Absolute URL or path relative to the origin
    url: String,
    /// HTTP method
    #[arg(short, long, default_value = "GET")]
    method: String,
    /// Treat the request as a top-level navigation
    #[arg(long)]
    navigate: bool,
    /// Write the response body to stdout
    #[arg(long)]
    body: bool,
  },
  /// List caches and their entries
  Caches,
  /// Deliver a background sync event
  Sync {
    #[arg(default_value = "background-sync")]
    tag: String,
  },
  /// Deliver a push event with an optional JSON payload
  Push { payload: Option<String> },
}

type Worker = CacheFallbackManager<SqliteStorage, HttpNetwork>;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_tracing(args.verbose, args.log_file.as_deref())?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Override origin if specified on command line
  let config = if let Some(origin) = args.origin {
    let config = Config { origin, ..config };
    config.validate()?;
    config
  } else {
    config
  };

  let storage = match args.db.as_deref().or(config.database_path()) {
    Some(path) => SqliteStorage::open_at(path)?,
    None => SqliteStorage::open_default()?,
  };
  let storage = Arc::new(storage);
  let network = HttpNetwork::new(&config.origin_url()?)?;
  let worker: Worker =
    CacheFallbackManager::new(&config, storage.clone(), network.clone(), Arc::new(LogNotifier))?;

  match args.command {
    Command::Install => {
      let mut host = Host::new(worker, network);
      host.install().await?;
      print_caches(&*storage)?;
    }
    Command::Activate => {
      let mut host = Host::restore_installed(worker, network);
      host.activate().await?;
      print_caches(&*storage)?;
    }
    Command::Fetch {
      url,
      method,
      navigate,
      body,
    } => {
      let url = config.resolve(&url)?;
      let method = method
        .to_uppercase()
        .parse::<Method>()
        .map_err(|e| eyre!("Invalid method '{}': {}", method, e))?;
      let request = if navigate {
        Request::navigate(url)
      } else {
        Request::get(url)
      };
      let request = request.with_method(method);

      let host = Host::restore_active(worker, network);
      let served = host.fetch(request).await?;

      if body {
        std::io::stdout().write_all(&served.response.body)?;
      } else {
        println!(
          "{} {} ({}, {} bytes)",
          served.response.status,
          served.response.status_text,
          served.source,
          served.response.body.len()
        );
        if let Some(cached_at) = served.cached_at {
          println!("cached at {}", cached_at.to_rfc3339());
        }
      }
    }
    Command::Caches => print_caches(&*storage)?,
    Command::Sync { tag } => {
      Host::restore_active(worker, network).sync(&tag).await?;
    }
    Command::Push { payload } => {
      Host::restore_active(worker, network)
        .push(payload.map(String::into_bytes))
        .await?;
    }
  }

  Ok(())
}

/// Log to stderr, or to `log_file` through a background writer.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let default_level = if verbose { "debug" } else { "info" };
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  let builder = tracing_subscriber::fmt().with_env_filter(filter);

  match log_file {
    Some(path) => {
      let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
      let appender = tracing_appender::rolling::never(dir, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      builder
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
      Ok(Some(guard))
    }
    None => {
      builder
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
      Ok(None)
    }
  }
}

fn print_caches(storage: &dyn CacheStorage) -> Result<()> {
  let names = storage.names()?;
  if names.is_empty() {
    println!("(no caches)");
  }
  for name in names {
    let keys = storage.keys(&name)?;
    println!("{} ({} entries)", name, keys.len());
    for key in keys {
      println!("  {}", key);
    }
  }
  Ok(())
}
