//! Local caching for remote content.
//!
//! This module provides:
//! - A durable string key-value store (SQLite, or memory when disabled)
//! - A time-boxed JSON cache with optional remote-version staleness
//! - Cache results that record whether data came from the network or the cache

mod layer;
mod storage;
mod traits;

pub use layer::ContentCache;
pub use storage::{KvStorage, MemoryStorage, SqliteStorage};
#[cfg(test)]
pub use traits::ManualClock;
pub use traits::{CacheEntry, CacheResult, CacheSource, Clock, SystemClock};
