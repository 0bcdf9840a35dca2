//! Call dispatch: cache, network or sync queue.
//!
//! Every call takes exactly one path:
//! - a cache hit returns immediately without touching the network
//! - an online miss goes to the network and may write the cache
//! - an offline miss (or a transient failure) of a queueable call is queued
//!
//! The network path is shared with the sync runner through [`Gateway::execute`],
//! so a replayed operation behaves exactly like the original call would have.

mod options;

pub use options::CallOptions;

use chrono::Duration;
use color_eyre::eyre::eyre;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

use crate::cache::{params_fingerprint, CacheKey, CacheResult, CacheStore, CORE_COMPONENT};
use crate::connectivity::ConnectivityMonitor;
use crate::error::{GatewayError, TransferError, TransportError};
use crate::remote::{FileTransfer, Site, Transport};
use crate::sync::{CacheTarget, QueueId, QueuedOp, SyncQueue};

/// Result of a gateway call. Exactly one variant is produced per call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
  /// Value from the cache or a completed network round trip
  Immediate(CacheResult<Value>),
  /// The operation was queued for replay
  Deferred(QueueId),
  Failed(GatewayError),
}

impl Outcome {
  pub fn value(&self) -> Option<&Value> {
    match self {
      Self::Immediate(result) => Some(&result.data),
      _ => None,
    }
  }

  pub fn is_deferred(&self) -> bool {
    matches!(self, Self::Deferred(_))
  }

  pub fn error(&self) -> Option<&GatewayError> {
    match self {
      Self::Failed(e) => Some(e),
      _ => None,
    }
  }
}

/// Presents failures of non-silent calls to the user.
pub trait ErrorReporter: Send + Sync {
  fn report(&self, operation: &str, error: &GatewayError);
}

/// Reporter that only logs.
pub struct LogReporter;

impl ErrorReporter for LogReporter {
  fn report(&self, operation: &str, error: &GatewayError) {
    tracing::error!(operation, "{}", error);
  }
}

/// Failure of a single network operation.
#[derive(Debug)]
pub(crate) enum OpError {
  Transport(TransportError),
  Transfer(TransferError),
}

impl OpError {
  fn is_transient(&self) -> bool {
    match self {
      Self::Transport(e) => e.is_transient(),
      Self::Transfer(e) => e.is_transient(),
    }
  }
}

impl From<OpError> for GatewayError {
  fn from(e: OpError) -> Self {
    match e {
      OpError::Transport(e) => e.into(),
      OpError::Transfer(e) => e.into(),
    }
  }
}

impl std::fmt::Display for OpError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Transport(e) => e.fmt(f),
      Self::Transfer(e) => e.fmt(f),
    }
  }
}

/// The call-dispatch engine.
#[derive(Clone)]
pub struct Gateway {
  cache: CacheStore,
  queue: SyncQueue,
  connectivity: ConnectivityMonitor,
  transport: Arc<dyn Transport>,
  transfer: Arc<dyn FileTransfer>,
  reporter: Arc<dyn ErrorReporter>,
  /// TTL for cached results when the call does not set one
  default_ttl: Option<Duration>,
}

impl Gateway {
  pub fn new(
    cache: CacheStore,
    queue: SyncQueue,
    connectivity: ConnectivityMonitor,
    transport: Arc<dyn Transport>,
    transfer: Arc<dyn FileTransfer>,
  ) -> Self {
    Self {
      cache,
      queue,
      connectivity,
      transport,
      transfer,
      reporter: Arc::new(LogReporter),
      default_ttl: Some(Duration::hours(1)),
    }
  }

  /// Set the TTL used when a call does not specify one (`None` = never expire).
  pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
    self.default_ttl = ttl;
    self
  }

  pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
    self.reporter = reporter;
    self
  }

  pub fn cache(&self) -> &CacheStore {
    &self.cache
  }

  pub fn queue(&self) -> &SyncQueue {
    &self.queue
  }

  pub fn connectivity(&self) -> &ConnectivityMonitor {
    &self.connectivity
  }

  /// Call `method` on `site`, caching under the core component.
  pub async fn call(&self, method: &str, params: Value, site: &Site, options: &CallOptions) -> Outcome {
    self
      .call_for(CORE_COMPONENT, method, params, site, options)
      .await
  }

  /// Call `method` on `site`, caching under `component`.
  pub async fn call_for(
    &self,
    component: &str,
    method: &str,
    params: Value,
    site: &Site,
    options: &CallOptions,
  ) -> Outcome {
    let key = CacheKey::for_call(component, method, &params, &site.id);
    let fingerprint = params_fingerprint(&params);

    if options.cache {
      match self
        .cache
        .get_matching(key.as_str(), options.omit_expires, Some(fingerprint.as_str()))
      {
        Ok(Some(hit)) => {
          tracing::debug!(%key, "cache hit");
          return Outcome::Immediate(hit);
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(%key, "cache read failed, treating as miss: {}", e),
      }
    }

    let cache = options.cache.then(|| CacheTarget {
      key: key.to_string(),
      component: component.to_string(),
      ttl_secs: options.ttl.or(self.default_ttl).map(|ttl| ttl.num_seconds()),
      fingerprint: Some(fingerprint.clone()),
    });
    let op = QueuedOp::RemoteCall {
      method: method.to_string(),
      params,
      cache,
    };

    // Offline calls fall back to whatever is cached, expired or not.
    let lookup = Lookup {
      key: key.as_str(),
      fingerprint: Some(fingerprint.as_str()),
    };
    self.dispatch(site, op, Some(lookup), options).await
  }

  /// Upload a local file to the site.
  pub async fn upload(&self, local: &Path, remote: &str, site: &Site, options: &CallOptions) -> Outcome {
    let op = QueuedOp::Upload {
      local_path: local.to_path_buf(),
      remote_target: remote.to_string(),
    };
    self.dispatch(site, op, None, options).await
  }

  /// Download `url` into `local` and remember the location under `resource_key`.
  ///
  /// When offline, a previously downloaded copy is returned if known.
  pub async fn download(
    &self,
    url: &str,
    local: &Path,
    resource_key: &str,
    component: &str,
    site: &Site,
    options: &CallOptions,
  ) -> Outcome {
    let op = QueuedOp::Download {
      url: url.to_string(),
      local_path: local.to_path_buf(),
      resource_key: resource_key.to_string(),
      component: component.to_string(),
    };
    let lookup = Lookup {
      key: resource_key,
      fingerprint: None,
    };
    self.dispatch(site, op, Some(lookup), options).await
  }

  async fn dispatch(
    &self,
    site: &Site,
    op: QueuedOp,
    lookup: Option<Lookup<'_>>,
    options: &CallOptions,
  ) -> Outcome {
    if !self.connectivity.check().await {
      if options.queueable {
        return self.defer(site, op, options);
      }
      return self.fallback(lookup, &op, GatewayError::Offline, options);
    }

    match self.execute(site, &op).await {
      Ok(data) => Outcome::Immediate(CacheResult::from_network(data)),
      Err(e) if e.is_transient() && options.queueable => {
        tracing::info!("{} lost connectivity ({}), deferring", op.describe(), e);
        self.defer(site, op, options)
      }
      Err(e) if e.is_transient() && options.force_cache => {
        self.fallback(lookup, &op, e.into(), options)
      }
      Err(e) => self.fail(&op, e.into(), options),
    }
  }

  /// Perform one operation against the network, writing the cache on success
  /// when the operation asks for it.
  pub(crate) async fn execute(&self, site: &Site, op: &QueuedOp) -> Result<Value, OpError> {
    match op {
      QueuedOp::RemoteCall {
        method,
        params,
        cache,
      } => {
        let data = self
          .transport
          .send(site, method, params)
          .await
          .map_err(OpError::Transport)?;

        if let Some(target) = cache {
          if let Err(e) = self.store_result(target, &data) {
            tracing::warn!(key = %target.key, "failed to cache result: {}", e);
          }
        }
        Ok(data)
      }
      QueuedOp::Upload {
        local_path,
        remote_target,
      } => {
        self
          .transfer
          .upload(site, local_path, remote_target)
          .await
          .map_err(OpError::Transfer)?;
        Ok(Value::Null)
      }
      QueuedOp::Download {
        url,
        local_path,
        resource_key,
        component,
      } => {
        let path = self
          .transfer
          .download(site, url, local_path)
          .await
          .map_err(OpError::Transfer)?;

        let stored = download_record(url, &path);
        if let Err(e) = self.cache.put(resource_key, stored.clone(), component, None) {
          tracing::warn!(key = %resource_key, "failed to store download: {}", e);
        }
        Ok(stored)
      }
    }
  }

  fn store_result(&self, target: &CacheTarget, data: &Value) -> color_eyre::Result<()> {
    let ttl = target
      .ttl_secs
      .map(|secs| {
        Duration::try_seconds(secs)
          .ok_or_else(|| eyre!("Cache TTL out of range: {}s", secs))
      })
      .transpose()?;
    self.cache.put_matching(
      &target.key,
      data.clone(),
      &target.component,
      ttl,
      target.fingerprint.as_deref(),
    )
  }

  fn defer(&self, site: &Site, op: QueuedOp, options: &CallOptions) -> Outcome {
    match self.queue.enqueue(&site.id, &op) {
      Ok(id) => {
        tracing::info!(%id, site = %site.id, "deferred {}", op.describe());
        Outcome::Deferred(id)
      }
      Err(e) => self.fail(&op, e.into(), options),
    }
  }

  fn fallback(
    &self,
    lookup: Option<Lookup<'_>>,
    op: &QueuedOp,
    error: GatewayError,
    options: &CallOptions,
  ) -> Outcome {
    if let Some(Lookup { key, fingerprint }) = lookup {
      match self.cache.get_matching(key, true, fingerprint) {
        Ok(Some(hit)) => {
          tracing::debug!(key, "serving cached value while offline");
          return Outcome::Immediate(hit.into_offline());
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(key, "cache read failed: {}", e),
      }
    }
    self.fail(op, error, options)
  }

  fn fail(&self, op: &QueuedOp, error: GatewayError, options: &CallOptions) -> Outcome {
    if !options.silent {
      self.reporter.report(&op.describe(), &error);
    }
    tracing::debug!("{} failed: {}", op.describe(), error);
    Outcome::Failed(error)
  }
}

/// Where a stale fallback value would be cached.
#[derive(Clone, Copy)]
struct Lookup<'a> {
  key: &'a str,
  fingerprint: Option<&'a str>,
}

fn download_record(url: &str, path: &Path) -> Value {
  json!({
    "url": url,
    "path": path.to_string_lossy(),
  })
}
