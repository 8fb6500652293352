//! Named, versioned response stores.
//!
//! This module provides the storage side of the asset cache:
//! - Any number of named stores, each mapping method + URL to a response
//! - Bulk inserts that either land completely or not at all
//! - Lookup across every store, used when answering intercepted requests
//! - Wholesale deletion of a store, used to purge stale versions

mod storage;
mod traits;

pub use storage::{CacheStorage, MemoryStorage, SqliteStorage};
pub use traits::{CachedResponse, ResponseSource, Served};
