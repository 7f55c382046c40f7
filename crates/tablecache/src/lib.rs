//! Read-through / write-through caching for key-value tables.
//!
//! A [`table::TableDefinition`] describes a table (name, key schema, backing
//! store, cache-key prefix and default TTL). Initializing it with a
//! [`context::RequestContext`] and an optional cache yields a
//! [`table::Table`] whose operations always hit the store and keep a side
//! cache of records keyed by their primary key.
//!
//! Backends are selected with feature flags:
//!
//! - `memory` (default): in-process LRU cache
//! - `redis`: Redis cache
//! - `inmemory` (default): in-process table store
//! - `dynamodb`: DynamoDB table store
//! - `cli`: the `tablecache` binary (implies `dynamodb` and `memory`)

pub mod cache;
pub mod config;
pub mod context;
pub mod storage;
pub mod table;

#[cfg(test)]
mod mocks;

pub use context::{RequestContext, RequestId};
pub use table::{Table, TableDefinition};
