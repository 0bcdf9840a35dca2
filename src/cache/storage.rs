//! Cache storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use super::traits::CacheEntry;
use crate::db::{parse_datetime, Database};

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Get the entry stored under `key`, expired or not.
  fn read(&self, key: &str) -> Result<Option<CacheEntry>>;

  /// Store an entry, replacing any entry with the same key.
  fn write(&self, entry: &CacheEntry) -> Result<()>;

  /// Delete every entry tagged with `component`. Returns the number removed.
  fn delete_component(&self, component: &str) -> Result<usize>;

  /// Delete every entry. Returns the number removed.
  fn delete_all(&self) -> Result<usize>;

  /// Number of stored entries.
  fn count(&self) -> Result<usize>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  db: Arc<Database>,
}

impl SqliteStorage {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }
}

impl CacheStorage for SqliteStorage {
  fn read(&self, key: &str) -> Result<Option<CacheEntry>> {
    let conn = self.db.conn()?;

    type Row = (String, Vec<u8>, String, Option<String>, Option<String>);
    let row: Option<Row> = conn
      .query_row(
        "SELECT component, value, created_at, expires_at, fingerprint FROM cache_entries
         WHERE cache_key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query cache entry: {}", e))?;

    let Some((component, data, created_at, expires_at, fingerprint)) = row else {
      return Ok(None);
    };

    let value =
      serde_json::from_slice(&data).map_err(|e| eyre!("Failed to deserialize entry: {}", e))?;

    Ok(Some(CacheEntry {
      key: key.to_string(),
      value,
      component,
      created_at: parse_datetime(&created_at)?,
      expires_at: expires_at.as_deref().map(parse_datetime).transpose()?,
      fingerprint,
    }))
  }

  fn write(&self, entry: &CacheEntry) -> Result<()> {
    let conn = self.db.conn()?;
    let data =
      serde_json::to_vec(&entry.value).map_err(|e| eyre!("Failed to serialize entry: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries
         (cache_key, component, value, created_at, expires_at, fingerprint)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
          entry.key,
          entry.component,
          data,
          entry.created_at.to_rfc3339(),
          entry.expires_at.map(|at| at.to_rfc3339()),
          entry.fingerprint,
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn delete_component(&self, component: &str) -> Result<usize> {
    let conn = self.db.conn()?;
    conn
      .execute(
        "DELETE FROM cache_entries WHERE component = ?",
        params![component],
      )
      .map_err(|e| eyre!("Failed to purge component {}: {}", component, e))
  }

  fn delete_all(&self) -> Result<usize> {
    let conn = self.db.conn()?;
    conn
      .execute("DELETE FROM cache_entries", [])
      .map_err(|e| eyre!("Failed to purge cache: {}", e))
  }

  fn count(&self) -> Result<usize> {
    let conn = self.db.conn()?;
    conn
      .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| {
        row.get::<_, i64>(0)
      })
      .map(|n| n as usize)
      .map_err(|e| eyre!("Failed to count cache entries: {}", e))
  }
}
