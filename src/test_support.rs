//! Scripted collaborators shared by unit tests.

use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::activity::ActivityLog;
use crate::cache::{CacheStore, SqliteStorage};
use crate::connectivity::{ConnectivityMonitor, ManualNetwork};
use crate::db::Database;
use crate::error::{GatewayError, TransferError, TransportError};
use crate::gateway::{ErrorReporter, Gateway};
use crate::remote::{FileTransfer, Site, Transport};
use crate::sync::SyncQueue;

pub fn site() -> Site {
  Site::new("site1", "https://school.example/api", "token-1")
}

/// Transport answering from a per-method script, `{"ok": true}` by default.
#[derive(Default)]
pub struct ScriptedTransport {
  calls: Mutex<Vec<(String, Value)>>,
  responses: Mutex<HashMap<String, Result<Value, TransportError>>>,
}

impl ScriptedTransport {
  pub fn respond(&self, method: &str, result: Result<Value, TransportError>) {
    self
      .responses
      .lock()
      .unwrap()
      .insert(method.to_string(), result);
  }

  /// Methods sent so far, in order.
  pub fn methods(&self) -> Vec<String> {
    self.calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
  }

  pub fn calls(&self) -> Vec<(String, Value)> {
    self.calls.lock().unwrap().clone()
  }
}

impl Transport for ScriptedTransport {
  fn send<'a>(
    &'a self,
    _site: &'a Site,
    method: &'a str,
    params: &'a Value,
  ) -> BoxFuture<'a, Result<Value, TransportError>> {
    self
      .calls
      .lock()
      .unwrap()
      .push((method.to_string(), params.clone()));
    let result = self
      .responses
      .lock()
      .unwrap()
      .get(method)
      .cloned()
      .unwrap_or_else(|| Ok(json!({"ok": true})));
    async move { result }.boxed()
  }
}

/// File transfer that records requests without touching the network.
#[derive(Default)]
pub struct ScriptedTransfer {
  uploads: Mutex<Vec<(PathBuf, String)>>,
  downloads: Mutex<Vec<String>>,
  failures: Mutex<HashMap<String, TransferError>>,
}

impl ScriptedTransfer {
  /// Make transfers involving `target` (remote target or URL) fail.
  pub fn fail(&self, target: &str, error: TransferError) {
    self
      .failures
      .lock()
      .unwrap()
      .insert(target.to_string(), error);
  }

  pub fn uploads(&self) -> Vec<(PathBuf, String)> {
    self.uploads.lock().unwrap().clone()
  }

  pub fn downloads(&self) -> Vec<String> {
    self.downloads.lock().unwrap().clone()
  }

  fn failure(&self, target: &str) -> Option<TransferError> {
    self.failures.lock().unwrap().get(target).cloned()
  }
}

impl FileTransfer for ScriptedTransfer {
  fn upload<'a>(
    &'a self,
    _site: &'a Site,
    local: &'a Path,
    remote: &'a str,
  ) -> BoxFuture<'a, Result<(), TransferError>> {
    self
      .uploads
      .lock()
      .unwrap()
      .push((local.to_path_buf(), remote.to_string()));
    let result = match self.failure(remote) {
      Some(e) => Err(e),
      None => Ok(()),
    };
    async move { result }.boxed()
  }

  fn download<'a>(
    &'a self,
    _site: &'a Site,
    url: &'a str,
    local: &'a Path,
  ) -> BoxFuture<'a, Result<PathBuf, TransferError>> {
    self.downloads.lock().unwrap().push(url.to_string());
    let result = match self.failure(url) {
      Some(e) => Err(e),
      None => Ok(local.to_path_buf()),
    };
    async move { result }.boxed()
  }
}

/// Reporter collecting what would have been shown to the user.
#[derive(Default)]
pub struct RecordingReporter {
  reports: Mutex<Vec<(String, GatewayError)>>,
}

impl RecordingReporter {
  pub fn reports(&self) -> Vec<(String, GatewayError)> {
    self.reports.lock().unwrap().clone()
  }
}

impl ErrorReporter for RecordingReporter {
  fn report(&self, operation: &str, error: &GatewayError) {
    self
      .reports
      .lock()
      .unwrap()
      .push((operation.to_string(), error.clone()));
  }
}

/// A gateway wired to scripted collaborators and an in-memory database.
pub struct Harness {
  pub db: Arc<Database>,
  pub cache: CacheStore,
  pub queue: SyncQueue,
  pub network: Arc<ManualNetwork>,
  pub connectivity: ConnectivityMonitor,
  pub transport: Arc<ScriptedTransport>,
  pub transfer: Arc<ScriptedTransfer>,
  pub reporter: Arc<RecordingReporter>,
  pub activity: Arc<ActivityLog>,
  pub gateway: Gateway,
}

impl Harness {
  pub fn new(online: bool) -> Self {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let cache = CacheStore::new(Arc::new(SqliteStorage::new(db.clone())));
    let queue = SyncQueue::new(db.clone());
    let network = Arc::new(ManualNetwork::new(online));
    let connectivity = ConnectivityMonitor::new(network.clone(), false);
    let transport = Arc::new(ScriptedTransport::default());
    let transfer = Arc::new(ScriptedTransfer::default());
    let reporter = Arc::new(RecordingReporter::default());

    let gateway = Gateway::new(
      cache.clone(),
      queue.clone(),
      connectivity.clone(),
      transport.clone(),
      transfer.clone(),
    )
    .with_reporter(reporter.clone());

    Self {
      db,
      cache,
      queue,
      network,
      connectivity,
      transport,
      transfer,
      reporter,
      activity: Arc::new(ActivityLog::new(100, false)),
      gateway,
    }
  }
}
