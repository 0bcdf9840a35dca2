use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use offgrid::error::GatewayError;
use offgrid::gateway::ErrorReporter;
use offgrid::config::MAX_CACHE_TTL_SECS;
use offgrid::{App, CallOptions, Config, Outcome, RunOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "offgrid")]
#[command(about = "Offline-tolerant gateway to a remote site")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/offgrid/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show connectivity, queue and cache state
  Status,
  /// Call a remote method
  Call {
    method: String,
    /// Parameters as a JSON object
    #[arg(short, long, default_value = "{}")]
    params: String,
    /// Component the cached result belongs to
    #[arg(long, default_value = "core")]
    component: String,
    /// Answer from the cache when possible and cache the result
    #[arg(long)]
    cache: bool,
    /// Cache lifetime in seconds
    #[arg(long, value_parser = clap::value_parser!(i64).range(0..=MAX_CACHE_TTL_SECS))]
    ttl: Option<i64>,
    /// Treat cached entries as fresh regardless of expiry
    #[arg(long)]
    omit_expires: bool,
    /// Fall back to a stale cached value when the network fails
    #[arg(long)]
    force_cache: bool,
    /// Defer the call when it cannot complete now
    #[arg(long)]
    queueable: bool,
  },
  /// Upload a local file
  Upload {
    local: PathBuf,
    remote: String,
    #[arg(long)]
    queueable: bool,
  },
  /// Download a file and remember where it was stored
  Download {
    url: String,
    local: PathBuf,
    /// Key the stored location is cached under
    #[arg(long)]
    key: String,
    #[arg(long, default_value = "files")]
    component: String,
    #[arg(long)]
    queueable: bool,
  },
  /// Replay queued operations now
  Sync {
    /// Only print activity lines containing this text
    #[arg(long)]
    filter: Option<String>,
  },
  /// Replay queued operations whenever the connection comes back
  Watch {
    /// Connectivity poll interval in milliseconds
    #[arg(long, default_value_t = 2000)]
    poll_ms: u64,
  },
  /// List queued operations
  Queue,
  /// Drop cached results
  Purge {
    /// Only purge this component
    #[arg(long)]
    component: Option<String>,
  },
  /// Force offline mode on or off
  Offline { state: Toggle },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
  On,
  Off,
}

/// Shows gateway failures on stderr.
struct StderrReporter;

impl ErrorReporter for StderrReporter {
  fn report(&self, operation: &str, error: &GatewayError) {
    eprintln!("Error: {}: {}", operation, error);
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = setup_logging(&config.data_dir()?)?;

  let token = Config::get_token()?;
  let app = App::new(config, token, Arc::new(StderrReporter))?;

  match args.command {
    Command::Status => {
      let status = app.status().await?;
      println!("site:       {}", status.site);
      println!("connected:  {}", status.connected);
      println!("forced:     {}", status.forced_offline);
      println!("sync:       {}", if status.sync_enabled { "enabled" } else { "disabled" });
      println!("queued:     {}", status.queued);
      println!("cached:     {}", status.cached);
    }
    Command::Call {
      method,
      params,
      component,
      cache,
      ttl,
      omit_expires,
      force_cache,
      queueable,
    } => {
      let params = serde_json::from_str(&params).map_err(|e| eyre!("Invalid params JSON: {}", e))?;
      let ttl = ttl
        .map(|secs| {
          chrono::Duration::try_seconds(secs).ok_or_else(|| eyre!("TTL out of range: {}", secs))
        })
        .transpose()?;
      let options = CallOptions {
        cache,
        omit_expires,
        force_cache,
        silent: false,
        queueable,
        ttl,
      };
      print_outcome(app.call(&component, &method, params, &options).await)?;
    }
    Command::Upload {
      local,
      remote,
      queueable,
    } => {
      let options = CallOptions {
        queueable,
        ..CallOptions::default()
      };
      print_outcome(app.upload(&local, &remote, &options).await)?;
    }
    Command::Download {
      url,
      local,
      key,
      component,
      queueable,
    } => {
      let options = CallOptions {
        queueable,
        ..CallOptions::default()
      };
      print_outcome(app.download(&url, &local, &key, &component, &options).await)?;
    }
    Command::Sync { filter } => {
      let outcome = app.sync().await?;
      for line in app.activity().filtered(filter.as_deref()).iter().rev() {
        println!("{}", line);
      }
      print_run(&outcome);
    }
    Command::Watch { poll_ms } => {
      println!("Watching connectivity for {}", app.site().id);
      app
        .watch(Duration::from_millis(poll_ms), print_run)
        .await?;
    }
    Command::Queue => {
      let entries = app.queued()?;
      if entries.is_empty() {
        println!("Queue is empty");
      }
      for entry in entries {
        println!(
          "{}  {}  {}",
          entry.id,
          entry.created_at.format("%Y-%m-%d %H:%M:%S"),
          entry.op.describe()
        );
      }
    }
    Command::Purge { component } => {
      let removed = app.purge(component.as_deref())?;
      println!("Purged {} cached entries", removed);
    }
    Command::Offline { state } => {
      let forced = matches!(state, Toggle::On);
      app.set_force_offline(forced)?;
      println!("Forced offline: {}", forced);
    }
  }

  Ok(())
}

fn setup_logging(data_dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(data_dir)
    .map_err(|e| eyre!("Failed to create data directory {}: {}", data_dir.display(), e))?;

  let filter = EnvFilter::try_from_env("OFFGRID_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
  let appender = tracing_appender::rolling::never(data_dir, "offgrid.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

fn print_outcome(outcome: Outcome) -> Result<()> {
  match outcome {
    Outcome::Immediate(result) => {
      eprintln!("({})", result.source);
      let pretty = serde_json::to_string_pretty(&result.data)
        .map_err(|e| eyre!("Failed to format result: {}", e))?;
      println!("{}", pretty);
      Ok(())
    }
    Outcome::Deferred(id) => {
      println!("Queued as {}; it will be sent when the connection returns", id);
      Ok(())
    }
    Outcome::Failed(e) => Err(eyre!("{}", e)),
  }
}

fn print_run(outcome: &RunOutcome) {
  match outcome {
    RunOutcome::Skipped(reason) => println!("Sync skipped: {:?}", reason),
    RunOutcome::Completed(report) => println!(
      "Sync finished for {}: {} replayed, {} failed, {} remaining",
      report.site, report.replayed, report.failed, report.remaining
    ),
  }
}
