use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted cache TTL (100 years)
pub const MAX_CACHE_TTL_SECS: i64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub site: SiteConfig,
  /// Gates the sync runner
  #[serde(default = "default_true")]
  pub sync_enabled: bool,
  /// TTL for cached results when a call sets none; 0 keeps them until purged
  #[serde(default = "default_cache_ttl")]
  pub cache_default_ttl_secs: u64,
  /// Pretend to be offline (testing / settings override)
  #[serde(default)]
  pub force_offline: bool,
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
  /// Record general activity lines, not only sync outcomes
  #[serde(default)]
  pub dev_debug: bool,
  /// Maximum number of activity lines kept
  #[serde(default = "default_log_length")]
  pub log_length: usize,
  /// Where the database and log file live (defaults to the XDG data dir)
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
  /// Identifier scoping queued operations and settings
  pub id: String,
  /// Endpoint receiving remote calls
  pub url: String,
}

fn default_true() -> bool {
  true
}

fn default_cache_ttl() -> u64 {
  3600
}

fn default_request_timeout() -> u64 {
  30
}

fn default_log_length() -> usize {
  200
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./offgrid.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/offgrid/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/offgrid/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("offgrid.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("offgrid").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    if config.site.id.trim().is_empty() {
      return Err(eyre!("site.id must not be empty"));
    }
    if config.cache_default_ttl_secs > MAX_CACHE_TTL_SECS as u64 {
      return Err(eyre!(
        "cache_default_ttl_secs must be at most {}",
        MAX_CACHE_TTL_SECS
      ));
    }
    Ok(config)
  }

  /// Get the site token from the environment.
  ///
  /// Checks OFFGRID_TOKEN.
  pub fn get_token() -> Result<String> {
    std::env::var("OFFGRID_TOKEN")
      .map_err(|_| eyre!("Site token not found. Set the OFFGRID_TOKEN environment variable."))
  }

  /// Default cache TTL, `None` when cached results never expire.
  pub fn cache_default_ttl(&self) -> Option<chrono::Duration> {
    match self.cache_default_ttl_secs {
      0 => None,
      secs => i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds),
    }
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  pub fn data_dir(&self) -> Result<PathBuf> {
    match &self.data_dir {
      Some(dir) => Ok(dir.clone()),
      None => crate::db::default_data_dir(),
    }
  }
}
