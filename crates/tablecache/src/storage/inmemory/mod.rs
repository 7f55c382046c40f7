//! In-memory storage backend for testing.
//!
//! This module provides an in-memory implementation of [`TableStore`] that
//! keeps every table in a `HashMap` wrapped in `Arc<RwLock<_>>`, with a small
//! evaluator for key condition, filter, condition and update expressions.
//! Useful for tests and local runs where persistence is not required.
//!
//! # Example
//!
//! ```rust,ignore
//! use tablecache::storage::inmemory::InMemoryStore;
//! use tablecache_core::storage::KeySchema;
//!
//! let store = InMemoryStore::with_tables([("orders", KeySchema::partition("id"))]);
//! ```
//!
//! [`TableStore`]: tablecache_core::storage::TableStore

mod expression;
mod store;

pub use store::InMemoryStore;
