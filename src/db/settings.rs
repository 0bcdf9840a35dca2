//! Persisted settings, optionally scoped to a site.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use super::Database;

/// Key/value settings stored next to the cache.
///
/// Site scoped settings live under `"{site}-{name}"` so the same name can hold
/// a different value per site.
#[derive(Clone)]
pub struct Settings {
  db: Arc<Database>,
}

impl Settings {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }

  fn setting_id(name: &str, site: Option<&str>) -> String {
    match site {
      Some(site) => format!("{}-{}", site, name),
      None => name.to_string(),
    }
  }

  /// Read a setting, `None` if it was never set.
  pub fn get(&self, name: &str, site: Option<&str>) -> Result<Option<String>> {
    if name.is_empty() {
      return Ok(None);
    }
    let conn = self.db.conn()?;
    conn
      .query_row(
        "SELECT value FROM settings WHERE id = ?",
        params![Self::setting_id(name, site)],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read setting {}: {}", name, e))
  }

  /// Read a boolean setting (`"true"`/`"false"`).
  pub fn get_bool(&self, name: &str, site: Option<&str>) -> Result<Option<bool>> {
    match self.get(name, site)? {
      Some(v) => v
        .parse::<bool>()
        .map(Some)
        .map_err(|e| eyre!("Setting {} is not a boolean ({}): {}", name, v, e)),
      None => Ok(None),
    }
  }

  pub fn set(&self, name: &str, value: &str, site: Option<&str>) -> Result<()> {
    let conn = self.db.conn()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO settings (id, name, value) VALUES (?, ?, ?)",
        params![Self::setting_id(name, site), name, value],
      )
      .map_err(|e| eyre!("Failed to store setting {}: {}", name, e))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn settings() -> Settings {
    Settings::new(Arc::new(Database::open_in_memory().unwrap()))
  }

  #[test]
  fn site_settings_are_scoped() {
    let settings = settings();
    settings.set("force_offline", "true", Some("site1")).unwrap();

    assert_eq!(settings.get_bool("force_offline", Some("site1")).unwrap(), Some(true));
    assert_eq!(settings.get_bool("force_offline", Some("site2")).unwrap(), None);
    assert_eq!(settings.get("force_offline", None).unwrap(), None);
  }

  #[test]
  fn empty_name_is_never_found() {
    let settings = settings();
    settings.set("", "value", Some("site1")).unwrap();
    assert_eq!(settings.get("", Some("site1")).unwrap(), None);
  }

  #[test]
  fn set_overwrites() {
    let settings = settings();
    assert_eq!(settings.get("lang", None).unwrap(), None);
    settings.set("lang", "en", None).unwrap();
    settings.set("lang", "es", None).unwrap();
    assert_eq!(settings.get("lang", None).unwrap().as_deref(), Some("es"));
  }

  #[test]
  fn non_boolean_value_is_an_error() {
    let settings = settings();
    settings.set("sync_enabled", "maybe", Some("site1")).unwrap();
    assert!(settings.get_bool("sync_enabled", Some("site1")).is_err());
  }

  #[test]
  fn settings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offgrid.db");

    Settings::new(Arc::new(Database::open(&path).unwrap()))
      .set("sync_enabled", "false", Some("site1"))
      .unwrap();

    let reopened = Settings::new(Arc::new(Database::open(&path).unwrap()));
    assert_eq!(reopened.get_bool("sync_enabled", Some("site1")).unwrap(), Some(false));
  }
}
