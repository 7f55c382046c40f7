//! DynamoDB storage backend implementation.
//!
//! This module provides a DynamoDB-based implementation of [`TableStore`]
//! using `aws-sdk-dynamodb`, with item conversion through `serde_dynamo`.
//!
//! [`TableStore`]: tablecache_core::storage::TableStore

mod conversions;
mod error;
mod store;

pub use store::{DynamoDbConnection, DynamoDbParams, DynamoDbStore};
