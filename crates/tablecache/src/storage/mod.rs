//! Table store backends and the cache-through layer.
//!
//! The backends implement [`TableStore`] from `tablecache_core::storage` and
//! are selected at compile time via feature flags:
//!
//! - `inmemory` (default): in-process store with a subset of the expression
//!   language, for tests and local runs
//! - `dynamodb`: AWS DynamoDB using `aws-sdk-dynamodb`
//!
//! Both may be enabled together.
//!
//! # Examples
//!
//! Build with DynamoDB:
//! ```bash
//! cargo build -p tablecache --features dynamodb
//! ```
//!
//! [`TableStore`]: tablecache_core::storage::TableStore

pub mod cached;

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;
