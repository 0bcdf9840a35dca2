//! Expiry-aware cache store on top of a storage backend.

use chrono::{Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::sync::Arc;

use super::storage::CacheStorage;
use super::traits::{CacheEntry, CacheResult};

/// Key/value cache with time-to-live and force-retain reads.
///
/// Expired entries are kept on disk until purged or overwritten, so a caller
/// with no network path can still ask for the stale value.
#[derive(Clone)]
pub struct CacheStore {
  storage: Arc<dyn CacheStorage>,
}

impl CacheStore {
  /// Create a new cache store with the given storage backend.
  pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
    Self { storage }
  }

  /// Look up `key`.
  ///
  /// Returns `None` when there is no entry, or when the entry has expired and
  /// `force` is false. With `force` an expired entry comes back tagged
  /// [`CacheSource::CacheStale`](super::CacheSource::CacheStale).
  pub fn get(&self, key: &str, force: bool) -> Result<Option<CacheResult<Value>>> {
    self.get_matching(key, force, None)
  }

  /// Like [`get`](Self::get), but an entry stored for a different params
  /// fingerprint counts as missing.
  pub fn get_matching(
    &self,
    key: &str,
    force: bool,
    fingerprint: Option<&str>,
  ) -> Result<Option<CacheResult<Value>>> {
    let Some(entry) = self.storage.read(key)? else {
      return Ok(None);
    };

    if !entry.matches(fingerprint) {
      tracing::debug!(key, "cache entry belongs to other params");
      return Ok(None);
    }

    let expired = entry.is_expired(Utc::now());
    if expired && !force {
      tracing::debug!(key, "cache entry expired");
      return Ok(None);
    }

    Ok(Some(CacheResult::from_cache(
      entry.value,
      entry.created_at,
      expired,
    )))
  }

  /// Store `value` under `key`, replacing any previous entry.
  ///
  /// `ttl = None` keeps the entry until it is explicitly purged.
  pub fn put(&self, key: &str, value: Value, component: &str, ttl: Option<Duration>) -> Result<()> {
    self.put_matching(key, value, component, ttl, None)
  }

  /// Store a call result tagged with the fingerprint of its params.
  pub fn put_matching(
    &self,
    key: &str,
    value: Value,
    component: &str,
    ttl: Option<Duration>,
    fingerprint: Option<&str>,
  ) -> Result<()> {
    let now = Utc::now();
    let expires_at = ttl
      .map(|ttl| {
        now
          .checked_add_signed(ttl)
          .ok_or_else(|| eyre!("Cache TTL out of range: {}s", ttl.num_seconds()))
      })
      .transpose()?;

    let entry = CacheEntry {
      key: key.to_string(),
      value,
      component: component.to_string(),
      created_at: now,
      expires_at,
      fingerprint: fingerprint.map(str::to_string),
    };
    self.storage.write(&entry)?;
    tracing::debug!(key, component, "cache entry stored");
    Ok(())
  }

  /// Remove every entry owned by `component`.
  pub fn purge_component(&self, component: &str) -> Result<usize> {
    let removed = self.storage.delete_component(component)?;
    tracing::info!(component, removed, "purged cache component");
    Ok(removed)
  }

  /// Remove every entry.
  pub fn purge_all(&self) -> Result<usize> {
    let removed = self.storage.delete_all()?;
    tracing::info!(removed, "purged cache");
    Ok(removed)
  }

  pub fn len(&self) -> Result<usize> {
    self.storage.count()
  }

  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }
}
