//! Durable queue of deferred operations.
//!
//! Entries are rows keyed by an autoincrement id, so insertion order is replay
//! order. The queue holds no business logic: the gateway appends, the runner
//! lists and removes.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::db::{parse_datetime, Database};

/// Identifier of a queued entry. Ids only grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueId(pub i64);

impl std::fmt::Display for QueueId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Where a replayed call result should be cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTarget {
  pub key: String,
  pub component: String,
  /// `None` keeps the entry until purged
  pub ttl_secs: Option<i64>,
  /// Params fingerprint stored with the result
  #[serde(default)]
  pub fingerprint: Option<String>,
}

/// A deferred operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum QueuedOp {
  RemoteCall {
    method: String,
    params: Value,
    #[serde(default)]
    cache: Option<CacheTarget>,
  },
  Upload {
    local_path: PathBuf,
    remote_target: String,
  },
  Download {
    url: String,
    local_path: PathBuf,
    /// Cache key the downloaded location is stored under
    resource_key: String,
    component: String,
  },
}

impl QueuedOp {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::RemoteCall { .. } => "remote-call",
      Self::Upload { .. } => "upload",
      Self::Download { .. } => "download",
    }
  }

  /// Short human readable description for logs.
  pub fn describe(&self) -> String {
    match self {
      Self::RemoteCall { method, .. } => format!("call {}", method),
      Self::Upload {
        local_path,
        remote_target,
      } => format!("upload {} to {}", local_path.display(), remote_target),
      Self::Download { url, .. } => format!("download {}", url),
    }
  }
}

/// A queued operation together with its queue metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
  pub id: QueueId,
  pub site: String,
  pub op: QueuedOp,
  pub created_at: DateTime<Utc>,
}

/// A queued row whose payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableEntry {
  pub id: QueueId,
  pub error: String,
}

/// Result of reading a site's queue.
#[derive(Debug, Default)]
pub struct QueueScan {
  pub entries: Vec<QueueEntry>,
  pub unreadable: Vec<UnreadableEntry>,
}

/// SQLite backed sync queue.
#[derive(Clone)]
pub struct SyncQueue {
  db: Arc<Database>,
}

impl SyncQueue {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }

  /// Append an operation for `site`. The entry is persisted before returning.
  pub fn enqueue(&self, site: &str, op: &QueuedOp) -> Result<QueueId> {
    let conn = self.db.conn()?;
    let payload =
      serde_json::to_vec(op).map_err(|e| eyre!("Failed to serialize queued operation: {}", e))?;

    conn
      .execute(
        "INSERT INTO sync_queue (site, kind, payload, created_at) VALUES (?, ?, ?, ?)",
        params![site, op.kind(), payload, Utc::now().to_rfc3339()],
      )
      .map_err(|e| eyre!("Failed to enqueue operation: {}", e))?;

    let id = QueueId(conn.last_insert_rowid());
    tracing::debug!(%id, site, kind = op.kind(), "operation queued");
    Ok(id)
  }

  /// All readable entries for `site`, in insertion order.
  ///
  /// Rows that cannot be decoded are logged and skipped; see [`scan`](Self::scan).
  pub fn list(&self, site: &str) -> Result<Vec<QueueEntry>> {
    let scan = self.scan(site)?;
    for bad in &scan.unreadable {
      tracing::warn!(id = %bad.id, site, "skipping unreadable queued operation: {}", bad.error);
    }
    Ok(scan.entries)
  }

  /// Every row for `site` in insertion order, split into decoded entries and
  /// rows whose payload could not be read. Unreadable rows stay in the table.
  pub fn scan(&self, site: &str) -> Result<QueueScan> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare(
        "SELECT id, payload, created_at FROM sync_queue
         WHERE site = ?
         ORDER BY id",
      )
      .map_err(|e| eyre!("Failed to prepare queue query: {}", e))?;

    let rows: Vec<(i64, Vec<u8>, String)> = stmt
      .query_map(params![site], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
      .map_err(|e| eyre!("Failed to query queue: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read queue row: {}", e))?;

    let mut scan = QueueScan::default();
    for (id, payload, created_at) in rows {
      let id = QueueId(id);
      let decoded = serde_json::from_slice::<QueuedOp>(&payload)
        .map_err(|e| eyre!("Failed to deserialize queued operation {}: {}", id, e))
        .and_then(|op| Ok((op, parse_datetime(&created_at)?)));

      match decoded {
        Ok((op, created_at)) => scan.entries.push(QueueEntry {
          id,
          site: site.to_string(),
          op,
          created_at,
        }),
        Err(e) => scan.unreadable.push(UnreadableEntry {
          id,
          error: e.to_string(),
        }),
      }
    }
    Ok(scan)
  }

  /// Remove an entry. Returns false if it was already gone.
  pub fn remove(&self, id: QueueId) -> Result<bool> {
    let conn = self.db.conn()?;
    let removed = conn
      .execute("DELETE FROM sync_queue WHERE id = ?", params![id.0])
      .map_err(|e| eyre!("Failed to remove queued operation {}: {}", id, e))?;
    Ok(removed > 0)
  }

  /// Number of entries queued for `site`.
  pub fn len(&self, site: &str) -> Result<usize> {
    let conn = self.db.conn()?;
    conn
      .query_row(
        "SELECT COUNT(*) FROM sync_queue WHERE site = ?",
        params![site],
        |row| row.get::<_, i64>(0),
      )
      .map(|n| n as usize)
      .map_err(|e| eyre!("Failed to count queue: {}", e))
  }

  pub fn is_empty(&self, site: &str) -> Result<bool> {
    Ok(self.len(site)? == 0)
  }

  /// Sites with pending entries, oldest pending entry first.
  pub fn sites(&self) -> Result<Vec<String>> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare("SELECT site FROM sync_queue GROUP BY site ORDER BY MIN(id)")
      .map_err(|e| eyre!("Failed to prepare site query: {}", e))?;

    let sites = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query queued sites: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read queued site: {}", e))?;
    Ok(sites)
  }
}
