//! User facing activity log.
//!
//! A short in-memory history of what the sync machinery did, newest line
//! first. Replay outcomes are always recorded; general chatter only when
//! `dev_debug` is enabled. Everything is mirrored to `tracing`.

use chrono::Local;
use std::collections::VecDeque;
use std::sync::Mutex;

pub struct ActivityLog {
  lines: Mutex<VecDeque<String>>,
  max_len: usize,
  dev_debug: bool,
}

impl ActivityLog {
  pub fn new(max_len: usize, dev_debug: bool) -> Self {
    Self {
      lines: Mutex::new(VecDeque::with_capacity(max_len.min(1024))),
      max_len: max_len.max(1),
      dev_debug,
    }
  }

  /// Record a line unconditionally.
  pub fn record(&self, component: &str, message: &str) {
    tracing::info!(component, "{}", message);
    let line = format!(
      "{} {}: {}",
      Local::now().format("%d/%m/%Y %H:%M:%S"),
      component,
      message
    );

    let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
    lines.push_front(line);
    lines.truncate(self.max_len);
  }

  /// Record a line only in debug mode.
  pub fn debug(&self, component: &str, message: &str) {
    if self.dev_debug {
      self.record(component, message);
    } else {
      tracing::debug!(component, "{}", message);
    }
  }

  /// All lines, newest first.
  pub fn lines(&self) -> Vec<String> {
    let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
    lines.iter().cloned().collect()
  }

  /// Lines containing `filter` (all lines if `None`), with consecutive
  /// duplicates shown once.
  pub fn filtered(&self, filter: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in self.lines() {
      if filter.is_some_and(|f| !line.contains(f)) {
        continue;
      }
      if out.last() == Some(&line) {
        continue;
      }
      out.push(line);
    }
    out
  }

  pub fn len(&self) -> usize {
    self.lines.lock().unwrap_or_else(|e| e.into_inner()).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn strip_time(line: &str) -> &str {
    // "dd/mm/yyyy hh:mm:ss " prefix
    &line[20..]
  }

  #[test]
  fn lines_carry_timestamp_and_component() {
    let log = ActivityLog::new(10, false);
    log.record("Sync", "replayed call submit_grade");

    let lines = log.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(strip_time(&lines[0]), "Sync: replayed call submit_grade");
    assert_eq!(lines[0].as_bytes()[2], b'/');
  }

  #[test]
  fn oldest_lines_are_dropped() {
    let log = ActivityLog::new(2, false);
    log.record("Core", "x");
    log.record("Core", "y");
    log.record("Other", "foo");

    let lines = log.lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(strip_time(&lines[0]), "Other: foo");
    assert_eq!(strip_time(&lines[1]), "Core: y");
  }

  #[test]
  fn debug_lines_need_dev_debug() {
    let quiet = ActivityLog::new(10, false);
    quiet.debug("Core", "hello");
    assert!(quiet.is_empty());

    let chatty = ActivityLog::new(10, true);
    chatty.debug("Core", "hello");
    assert_eq!(chatty.len(), 1);
  }

  #[test]
  fn filter_matches_and_collapses_duplicates() {
    let log = ActivityLog::new(20, false);
    {
      let mut lines = log.lines.lock().unwrap();
      for line in [
        "log entry containing testFilter within the string",
        "log entry number five for testFilter",
        "testFilter: log entry duplicate",
        "testFilter: log entry duplicate",
        "testFilter: log entry duplicate",
        "testFilter: log entry number four",
        "log entry number three",
        "testFilter: log entry number two",
        "log entry number one",
      ] {
        lines.push_back(line.to_string());
      }
    }

    assert_eq!(
      log.filtered(Some("testFilter")),
      vec![
        "log entry containing testFilter within the string",
        "log entry number five for testFilter",
        "testFilter: log entry duplicate",
        "testFilter: log entry number four",
        "testFilter: log entry number two",
      ]
    );
    assert_eq!(log.filtered(None).len(), 7);
  }
}
