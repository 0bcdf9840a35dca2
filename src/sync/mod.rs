//! Offline sync: the durable queue and the runner that replays it.
//!
//! ```text
//! ┌─────────────┐  defer   ┌─────────────┐  list/remove  ┌─────────────┐
//! │   Gateway   │─────────►│  SyncQueue  │◄──────────────│ SyncRunner  │
//! └─────────────┘          └─────────────┘               └──────┬──────┘
//!        ▲                                                      │
//!        └────────────────── execute (network path) ────────────┘
//! ```
//!
//! Retries are unbounded: a failing entry stays queued until a later run
//! succeeds, and the activity log is the only trace of repeated failures.

mod queue;
mod runner;

pub use queue::{CacheTarget, QueueEntry, QueueId, QueueScan, QueuedOp, SyncQueue, UnreadableEntry};
pub use runner::{RunOutcome, SkipReason, SyncReport, SyncRunner};
