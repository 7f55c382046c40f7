//! In-memory cache backend implementation.
//!
//! Provides a thread-safe, LRU-bounded in-memory cache with TTL support for
//! single-instance deployments and tests.

mod cache;

pub use cache::MemoryCache;
