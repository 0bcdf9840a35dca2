use chrono::Duration;

/// Per-call behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
  /// Try the cache before the network, and cache network results
  pub cache: bool,
  /// Treat cached entries as fresh regardless of their expiry
  pub omit_expires: bool,
  /// On a transient network failure, fall back to a stale cached value
  pub force_cache: bool,
  /// Do not report failures to the user; they are still returned
  pub silent: bool,
  /// Defer the call to the sync queue when it cannot complete now
  pub queueable: bool,
  /// Lifetime of the cached result; `None` uses the configured default
  pub ttl: Option<Duration>,
}

impl CallOptions {
  /// Options for a cached read.
  pub fn cached() -> Self {
    Self {
      cache: true,
      ..Self::default()
    }
  }

  /// Options for a call that may be deferred.
  pub fn queueable() -> Self {
    Self {
      queueable: true,
      ..Self::default()
    }
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = Some(ttl);
    self
  }

  pub fn omit_expires(mut self) -> Self {
    self.omit_expires = true;
    self
  }

  pub fn force_cache(mut self) -> Self {
    self.force_cache = true;
    self
  }

  pub fn silent(mut self) -> Self {
    self.silent = true;
    self
  }

  pub fn and_queueable(mut self) -> Self {
    self.queueable = true;
    self
  }
}
