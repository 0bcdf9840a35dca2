use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::activity::ActivityLog;
use crate::cache::{CacheStore, SqliteStorage};
use crate::config::Config;
use crate::connectivity::{ConnectivityMonitor, HostProbe, NetworkState};
use crate::db::{Database, Settings};
use crate::event::{ConnectivityWatcher, Event};
use crate::gateway::{CallOptions, ErrorReporter, Gateway, Outcome};
use crate::remote::{FileTransfer, HttpFileTransfer, HttpTransport, Site, Transport};
use crate::sync::{QueueEntry, RunOutcome, SyncQueue, SyncRunner};

const FORCE_OFFLINE_SETTING: &str = "force_offline";

/// Upper bound for a single connectivity probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot of the local state for one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
  pub site: String,
  pub connected: bool,
  pub forced_offline: bool,
  pub sync_enabled: bool,
  pub queued: usize,
  pub cached: usize,
}

/// Everything wired together for one configured site
pub struct App {
  config: Config,
  site: Site,
  settings: Settings,
  activity: Arc<ActivityLog>,
  gateway: Gateway,
  runner: SyncRunner,
}

impl App {
  /// Open the local database and build HTTP collaborators for the configured site.
  pub fn new(config: Config, token: String, reporter: Arc<dyn ErrorReporter>) -> Result<Self> {
    let data_dir = config.data_dir()?;
    let db = Arc::new(Database::open(&data_dir.join("offgrid.db"))?);
    let site = Site::new(config.site.id.clone(), config.site.url.clone(), token);

    let probe_timeout = config.request_timeout().min(PROBE_TIMEOUT);
    let network = HostProbe::for_url(&site.url, probe_timeout)
      .ok_or_else(|| eyre!("Invalid site url: {}", site.url))?;
    let transport = HttpTransport::new(config.request_timeout())
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;
    let transfer = HttpFileTransfer::new(config.request_timeout())
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Self::with_collaborators(
      config,
      site,
      db,
      Arc::new(network),
      Arc::new(transport),
      Arc::new(transfer),
      reporter,
    )
  }

  pub fn with_collaborators(
    config: Config,
    site: Site,
    db: Arc<Database>,
    network: Arc<dyn NetworkState>,
    transport: Arc<dyn Transport>,
    transfer: Arc<dyn FileTransfer>,
    reporter: Arc<dyn ErrorReporter>,
  ) -> Result<Self> {
    let settings = Settings::new(db.clone());
    let force_offline = settings
      .get_bool(FORCE_OFFLINE_SETTING, Some(&site.id))?
      .unwrap_or(config.force_offline);

    let cache = CacheStore::new(Arc::new(SqliteStorage::new(db.clone())));
    let queue = SyncQueue::new(db);
    let connectivity = ConnectivityMonitor::new(network, force_offline);
    let gateway = Gateway::new(cache, queue, connectivity, transport, transfer)
      .with_default_ttl(config.cache_default_ttl())
      .with_reporter(reporter);

    let activity = Arc::new(ActivityLog::new(config.log_length, config.dev_debug));
    let runner = SyncRunner::new(gateway.clone(), activity.clone(), config.sync_enabled);

    Ok(Self {
      config,
      site,
      settings,
      activity,
      gateway,
      runner,
    })
  }

  pub fn site(&self) -> &Site {
    &self.site
  }

  pub fn gateway(&self) -> &Gateway {
    &self.gateway
  }

  pub fn activity(&self) -> &ActivityLog {
    &self.activity
  }

  pub async fn call(&self, component: &str, method: &str, params: Value, options: &CallOptions) -> Outcome {
    self
      .gateway
      .call_for(component, method, params, &self.site, options)
      .await
  }

  pub async fn upload(&self, local: &Path, remote: &str, options: &CallOptions) -> Outcome {
    self.gateway.upload(local, remote, &self.site, options).await
  }

  pub async fn download(
    &self,
    url: &str,
    local: &Path,
    resource_key: &str,
    component: &str,
    options: &CallOptions,
  ) -> Outcome {
    self
      .gateway
      .download(url, local, resource_key, component, &self.site, options)
      .await
  }

  /// Replay this site's queue now
  pub async fn sync(&self) -> Result<RunOutcome> {
    self.runner.run(&self.site).await
  }

  pub fn queued(&self) -> Result<Vec<QueueEntry>> {
    self.gateway.queue().list(&self.site.id)
  }

  /// Drop cached results, for one component or all of them
  pub fn purge(&self, component: Option<&str>) -> Result<usize> {
    let removed = match component {
      Some(c) => self.gateway.cache().purge_component(c)?,
      None => self.gateway.cache().purge_all()?,
    };
    self.activity.debug(
      "Cache",
      &format!("purged {} entries ({})", removed, component.unwrap_or("all")),
    );
    Ok(removed)
  }

  /// Toggle the offline override and remember it for this site
  pub fn set_force_offline(&self, forced: bool) -> Result<()> {
    let value = if forced { "true" } else { "false" };
    self
      .settings
      .set(FORCE_OFFLINE_SETTING, value, Some(&self.site.id))?;
    self.gateway.connectivity().set_force_offline(forced);
    tracing::info!(site = %self.site.id, forced, "force offline updated");
    Ok(())
  }

  pub async fn status(&self) -> Result<Status> {
    let connectivity = self.gateway.connectivity();
    Ok(Status {
      site: self.site.id.clone(),
      connected: connectivity.check().await,
      forced_offline: connectivity.is_forced_offline(),
      sync_enabled: self.config.sync_enabled,
      queued: self.gateway.queue().len(&self.site.id)?,
      cached: self.gateway.cache().len()?,
    })
  }

  /// Watch connectivity and replay the queue on every transition to online.
  ///
  /// Runs until the watcher stops; `on_run` sees every completed or skipped run.
  pub async fn watch<F>(&self, poll_rate: Duration, mut on_run: F) -> Result<()>
  where
    F: FnMut(&RunOutcome),
  {
    let mut watcher = ConnectivityWatcher::new(self.gateway.connectivity().clone(), poll_rate);

    while let Some(event) = watcher.next().await {
      match event {
        Event::Online => {
          tracing::info!(site = %self.site.id, "connection restored");
          let outcome = self.sync().await?;
          on_run(&outcome);
        }
        Event::Offline => {
          tracing::info!(site = %self.site.id, "connection lost");
        }
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::connectivity::ManualNetwork;
  use crate::gateway::LogReporter;
  use crate::sync::QueuedOp;
  use crate::test_support::{site, ScriptedTransfer, ScriptedTransport};
  use serde_json::json;

  fn config(yaml_extra: &str) -> Config {
    Config::from_yaml(&format!(
      "site:\n  id: site1\n  url: https://school.example/api\n{}",
      yaml_extra
    ))
    .unwrap()
  }

  fn app(config: Config, db: Arc<Database>, network: Arc<ManualNetwork>) -> App {
    App::with_collaborators(
      config,
      site(),
      db,
      network,
      Arc::new(ScriptedTransport::default()),
      Arc::new(ScriptedTransfer::default()),
      Arc::new(LogReporter),
    )
    .unwrap()
  }

  #[tokio::test]
  async fn force_offline_setting_survives_restart() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let network = Arc::new(ManualNetwork::new(true));

    let first = app(config(""), db.clone(), network.clone());
    assert!(first.status().await.unwrap().connected);
    first.set_force_offline(true).unwrap();
    assert!(!first.status().await.unwrap().connected);

    let second = app(config(""), db, network);
    let status = second.status().await.unwrap();
    assert!(status.forced_offline);
    assert!(!status.connected);
  }

  #[tokio::test]
  async fn stored_setting_overrides_file() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let network = Arc::new(ManualNetwork::new(true));

    let first = app(config("force_offline: true\n"), db.clone(), network.clone());
    assert!(first.status().await.unwrap().forced_offline);
    first.set_force_offline(false).unwrap();

    let second = app(config("force_offline: true\n"), db, network);
    assert!(!second.status().await.unwrap().forced_offline);
  }

  #[tokio::test]
  async fn status_counts_queue_and_cache() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let network = Arc::new(ManualNetwork::new(true));
    let app = app(config(""), db, network.clone());

    app
      .call("core", "get_courses", json!({"userid": 5}), &CallOptions::cached())
      .await;
    network.set_online(false);
    let outcome = app
      .call("core", "submit", json!({"a": 1}), &CallOptions::queueable())
      .await;
    assert!(outcome.is_deferred());

    let status = app.status().await.unwrap();
    assert_eq!(status.queued, 1);
    assert_eq!(status.cached, 1);
    assert!(status.sync_enabled);
    assert_eq!(app.queued().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn purge_by_component() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let app = app(config(""), db, Arc::new(ManualNetwork::new(true)));
    let cached = CallOptions::cached();

    app.call("core", "a", json!({}), &cached).await;
    app.call("mod_forum", "b", json!({}), &cached).await;

    assert_eq!(app.purge(Some("mod_forum")).unwrap(), 1);
    assert_eq!(app.purge(None).unwrap(), 1);
    assert_eq!(app.status().await.unwrap().cached, 0);
  }

  #[tokio::test]
  async fn disabled_sync_leaves_queue() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let app = app(config("sync_enabled: false\n"), db, Arc::new(ManualNetwork::new(true)));
    app
      .gateway()
      .queue()
      .enqueue("site1", &QueuedOp::RemoteCall {
        method: "submit".to_string(),
        params: json!({}),
        cache: None,
      })
      .unwrap();

    let outcome = app.sync().await.unwrap();
    assert_eq!(outcome, RunOutcome::Skipped(crate::sync::SkipReason::Disabled));
    assert_eq!(app.status().await.unwrap().queued, 1);
  }

  #[tokio::test]
  async fn watch_replays_when_connection_returns() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let network = Arc::new(ManualNetwork::new(false));
    let app = app(config(""), db, network.clone());
    app
      .call("core", "submit", json!({"grade": 7}), &CallOptions::queueable())
      .await;

    let mut runs = Vec::new();
    let watching = app.watch(Duration::from_millis(5), |outcome| runs.push(outcome.clone()));
    let reconnect = async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      network.set_online(true);
      tokio::time::sleep(Duration::from_millis(300)).await;
    };

    tokio::select! {
      result = watching => panic!("watcher stopped: {:?}", result),
      _ = reconnect => {}
    }

    assert_eq!(runs.len(), 1);
    assert!(matches!(&runs[0], RunOutcome::Completed(r) if r.replayed == 1));
    assert_eq!(app.status().await.unwrap().queued, 0);
  }
}
