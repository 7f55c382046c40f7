//! Cache-through store.
//!
//! Wraps a [`TableStore`] with read-through and write-through caching keyed
//! by each record's primary key:
//!
//! - **Reads**: check the cache first; on a miss read the store and populate
//!   the cache when a TTL is given
//! - **Writes**: persist to the store, then mirror the record into the cache
//! - **Deletes**: remove from the store, then drop the cached copy
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryStore::with_tables([("orders", KeySchema::partition("id"))]));
//! let cache = Arc::new(MemoryCache::new(10_000));
//!
//! let cached = CacheThroughStore::new(store, Some(cache), "orders", KeySchema::partition("id"));
//! ```
//!
//! [`TableStore`]: tablecache_core::storage::TableStore

mod stats;
mod store;

pub use stats::{CacheStats, CacheStatsSnapshot};
pub(crate) use store::effective_ttl;
pub use store::{CacheThroughStore, DEFAULT_CACHE_TTL};
