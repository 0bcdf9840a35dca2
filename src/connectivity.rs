//! Online/offline detection.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Platform view of the network.
pub trait NetworkState: Send + Sync {
  fn network_available(&self) -> bool;
}

/// Network state toggled by hand (settings screens, tests).
#[derive(Debug, Default)]
pub struct ManualNetwork {
  online: AtomicBool,
}

impl ManualNetwork {
  pub fn new(online: bool) -> Self {
    Self {
      online: AtomicBool::new(online),
    }
  }

  pub fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::SeqCst);
  }
}

impl NetworkState for ManualNetwork {
  fn network_available(&self) -> bool {
    self.online.load(Ordering::SeqCst)
  }
}

/// Network state probed with a TCP connect to the site host.
#[derive(Debug, Clone)]
pub struct HostProbe {
  host: String,
  port: u16,
  timeout: Duration,
}

impl HostProbe {
  /// Probe the host of `site_url`. Returns `None` if the URL has no host.
  pub fn for_url(site_url: &str, timeout: Duration) -> Option<Self> {
    let url = Url::parse(site_url).ok()?;
    Some(Self {
      host: url.host_str()?.to_string(),
      port: url.port_or_known_default()?,
      timeout,
    })
  }
}

impl NetworkState for HostProbe {
  fn network_available(&self) -> bool {
    let addrs = match (self.host.as_str(), self.port).to_socket_addrs() {
      Ok(addrs) => addrs,
      Err(e) => {
        tracing::debug!(host = %self.host, "host lookup failed: {}", e);
        return false;
      }
    };
    addrs
      .into_iter()
      .any(|addr| TcpStream::connect_timeout(&addr, self.timeout).is_ok())
  }
}

/// Answers "are we online?" on every call, honouring a force-offline override.
#[derive(Clone)]
pub struct ConnectivityMonitor {
  network: Arc<dyn NetworkState>,
  force_offline: Arc<AtomicBool>,
}

impl ConnectivityMonitor {
  pub fn new(network: Arc<dyn NetworkState>, force_offline: bool) -> Self {
    Self {
      network,
      force_offline: Arc::new(AtomicBool::new(force_offline)),
    }
  }

  /// Check connectivity from async code.
  ///
  /// The network probe may block on DNS and a TCP connect, so it runs on the
  /// blocking pool.
  pub async fn check(&self) -> bool {
    let monitor = self.clone();
    match tokio::task::spawn_blocking(move || monitor.is_connected()).await {
      Ok(connected) => connected,
      Err(e) => {
        tracing::warn!("connectivity probe failed: {}", e);
        false
      }
    }
  }

  /// Blocking check; prefer [`check`](Self::check) on the runtime.
  pub fn is_connected(&self) -> bool {
    if self.force_offline.load(Ordering::SeqCst) {
      tracing::debug!("returning not connected (forced by settings)");
      return false;
    }
    let connected = self.network.network_available();
    tracing::debug!("internet connection checked {}", connected);
    connected
  }

  pub fn set_force_offline(&self, forced: bool) {
    self.force_offline.store(forced, Ordering::SeqCst);
  }

  pub fn is_forced_offline(&self) -> bool {
    self.force_offline.load(Ordering::SeqCst)
  }
}
