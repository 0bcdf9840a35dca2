//! Replays queued operations once connectivity is back.

use color_eyre::Result;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::activity::ActivityLog;
use crate::gateway::Gateway;
use crate::remote::Site;

const LOG_COMPONENT: &str = "Sync";

/// Why a run did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  /// Synchronization is turned off in configuration
  Disabled,
  /// The device is not connected
  Offline,
  /// Another run for the same site is in progress
  AlreadyRunning,
}

/// Counts from one replay pass over a site's queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
  pub site: String,
  /// Entries replayed successfully and removed
  pub replayed: usize,
  /// Entries whose replay failed; they stay queued
  pub failed: usize,
  /// Entries left in the queue after the pass
  pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
  Skipped(SkipReason),
  Completed(SyncReport),
}

/// Drains the sync queue through the gateway's network path.
pub struct SyncRunner {
  gateway: Gateway,
  activity: Arc<ActivityLog>,
  sync_enabled: bool,
  running: Mutex<HashSet<String>>,
}

/// Marks a site as being replayed until dropped.
pub(super) struct RunGuard<'a> {
  running: &'a Mutex<HashSet<String>>,
  site: String,
}

impl Drop for RunGuard<'_> {
  fn drop(&mut self) {
    let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
    running.remove(&self.site);
  }
}

impl SyncRunner {
  pub fn new(gateway: Gateway, activity: Arc<ActivityLog>, sync_enabled: bool) -> Self {
    Self {
      gateway,
      activity,
      sync_enabled,
      running: Mutex::new(HashSet::new()),
    }
  }

  pub(super) fn claim(&self, site: &str) -> Option<RunGuard<'_>> {
    let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
    if !running.insert(site.to_string()) {
      return None;
    }
    Some(RunGuard {
      running: &self.running,
      site: site.to_string(),
    })
  }

  /// Replay every queued entry of `site`, oldest first.
  ///
  /// Entries are removed only after a successful replay. A failing entry is
  /// logged, left untouched and does not stop later entries.
  pub async fn run(&self, site: &Site) -> Result<RunOutcome> {
    if !self.sync_enabled {
      tracing::warn!(site = %site.id, "sync process is disabled");
      return Ok(RunOutcome::Skipped(SkipReason::Disabled));
    }
    if !self.gateway.connectivity().check().await {
      tracing::info!(site = %site.id, "not connected, skipping sync");
      return Ok(RunOutcome::Skipped(SkipReason::Offline));
    }
    let Some(_guard) = self.claim(&site.id) else {
      tracing::info!(site = %site.id, "sync already running");
      return Ok(RunOutcome::Skipped(SkipReason::AlreadyRunning));
    };

    let queue = self.gateway.queue();
    let scan = queue.scan(&site.id)?;
    self.activity.debug(
      LOG_COMPONENT,
      &format!("replaying {} queued operations for {}", scan.entries.len(), site.id),
    );

    let mut report = SyncReport {
      site: site.id.clone(),
      ..SyncReport::default()
    };

    // Unreadable rows are kept for inspection and never block the rest.
    for bad in scan.unreadable {
      report.failed += 1;
      self.activity.record(
        LOG_COMPONENT,
        &format!("{} could not be read, left in queue: {}", bad.id, bad.error),
      );
    }

    for entry in scan.entries {
      let what = entry.op.describe();
      match self.gateway.execute(site, &entry.op).await {
        Ok(_) => match queue.remove(entry.id) {
          Ok(_) => {
            report.replayed += 1;
            self
              .activity
              .record(LOG_COMPONENT, &format!("{} {} done", entry.id, what));
          }
          Err(e) => {
            // Replayed but still queued; it will be sent again next run.
            report.failed += 1;
            self.activity.record(
              LOG_COMPONENT,
              &format!("{} {} done but could not be dequeued: {}", entry.id, what, e),
            );
          }
        },
        Err(e) => {
          report.failed += 1;
          self
            .activity
            .record(LOG_COMPONENT, &format!("{} {} failed: {}", entry.id, what, e));
        }
      }
    }

    report.remaining = queue.len(&site.id)?;
    tracing::info!(
      site = %site.id,
      replayed = report.replayed,
      failed = report.failed,
      remaining = report.remaining,
      "sync finished"
    );
    Ok(RunOutcome::Completed(report))
  }

  /// Run each of `sites` that has pending entries, one site at a time.
  pub async fn run_all(&self, sites: &[Site]) -> Result<Vec<RunOutcome>> {
    let pending = self.gateway.queue().sites()?;
    let mut outcomes = Vec::new();
    for id in pending {
      if let Some(site) = sites.iter().find(|s| s.id == id) {
        outcomes.push(self.run(site).await?);
      } else {
        tracing::debug!(site = %id, "queued entries for unknown site left untouched");
      }
    }
    Ok(outcomes)
  }
}
