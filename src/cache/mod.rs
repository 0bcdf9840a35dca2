//! Local cache for remote call results.
//!
//! This module provides the persistent cache the gateway reads before going to
//! the network:
//! - One entry per key, replaced atomically on write
//! - Optional time-to-live per entry, checked at read time
//! - Forced reads that return stale values when no network path exists
//! - Bulk invalidation per owning component

mod key;
mod layer;
mod storage;
mod traits;

pub use key::{params_fingerprint, CacheKey, CORE_COMPONENT};
pub use layer::CacheStore;
pub use storage::{CacheStorage, SqliteStorage};
pub use traits::{CacheEntry, CacheResult, CacheSource};
