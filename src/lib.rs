//! Offline-tolerant gateway to a remote site.
//!
//! Remote calls go through a [`Gateway`] that answers from a local cache when
//! it can, defers queueable operations while offline, and lets a
//! [`SyncRunner`] replay them once connectivity returns.

pub mod activity;
pub mod app;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod event;
pub mod gateway;
pub mod remote;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use app::{App, Status};
pub use cache::{CacheResult, CacheSource, CacheStore};
pub use config::Config;
pub use connectivity::ConnectivityMonitor;
pub use error::GatewayError;
pub use gateway::{CallOptions, Gateway, Outcome};
pub use remote::Site;
pub use sync::{RunOutcome, SyncQueue, SyncRunner};
