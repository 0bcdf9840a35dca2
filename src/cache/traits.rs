//! Core types for the caching system.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A stored cache record.
///
/// At most one entry exists per `key`; writing replaces the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
  pub key: String,
  pub value: Value,
  /// Owner tag used for bulk invalidation (e.g. "core" or a plugin name)
  pub component: String,
  pub created_at: DateTime<Utc>,
  /// `None` means the entry never expires unless purged
  pub expires_at: Option<DateTime<Utc>>,
  /// Params fingerprint of the call that produced the value, if any
  pub fingerprint: Option<String>,
}

impl CacheEntry {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at.is_some_and(|at| at <= now)
  }

  /// Whether the entry may answer a lookup made with `fingerprint`.
  ///
  /// Entries or lookups without a fingerprint always match.
  pub fn matches(&self, fingerprint: Option<&str>) -> bool {
    match (self.fingerprint.as_deref(), fingerprint) {
      (Some(stored), Some(wanted)) => stored == wanted,
      _ => true,
    }
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      cached_at: Some(cached_at),
    }
  }

  /// Re-tag a cached value as served because the network was unavailable.
  pub fn into_offline(self) -> Self {
    Self {
      source: CacheSource::Offline,
      ..self
    }
  }

  pub fn is_from_cache(&self) -> bool {
    self.source != CacheSource::Network
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Data from cache past its expiry, returned because expiry was ignored
  CacheStale,
  /// Offline mode - network unavailable, serving cached data
  Offline,
}

impl std::fmt::Display for CacheSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let label = match self {
      Self::Network => "network",
      Self::CacheFresh => "cache",
      Self::CacheStale => "cache (stale)",
      Self::Offline => "cache (offline)",
    };
    f.write_str(label)
  }
}
