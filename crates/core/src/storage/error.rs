use thiserror::Error;

use crate::cache::CacheError;

/// Errors raised while deriving primary keys or cache keys.
///
/// These are caller contract violations: a record without its key
/// attributes, a malformed key schema, or a record that is not a map.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid key schema: {0}")]
    InvalidSchema(String),
    #[error("Record is missing key attribute '{attribute}'")]
    MissingAttribute { attribute: String },
    #[error("Record is not an attribute map: {0}")]
    NotAnObject(String),
}

/// Errors reported by a table store backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Conditional check failed: {0}")]
    ConditionalCheckFailed(String),
    #[error("Request throttled: {0}")]
    Throttled(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),
}

/// Result type for table store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by table operations.
///
/// Store failures are hard: nothing (or only part of the request) was
/// persisted. Cache write failures are soft: the store call succeeded and
/// only the cached copy may be stale or missing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("Item not found in {table}: {key}")]
    NotFound { table: String, key: String },
    #[error("Cache write failed: {0}")]
    CacheWrite(CacheError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Key(#[from] KeyError),
}

impl TableError {
    /// True when the backing store already holds the correct data and only
    /// the cache is affected.
    pub fn is_cache_failure(&self) -> bool {
        matches!(self, TableError::CacheWrite(_))
    }

    /// True when the error originated in the backing store.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, TableError::Store(_))
    }
}

impl From<CacheError> for TableError {
    fn from(err: CacheError) -> Self {
        TableError::CacheWrite(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_error_missing_attribute_display() {
        let error = KeyError::MissingAttribute {
            attribute: "id".to_string(),
        };
        assert_eq!(error.to_string(), "Record is missing key attribute 'id'");
    }

    #[test]
    fn test_store_error_conditional_display() {
        let error = StoreError::ConditionalCheckFailed("attribute_exists(id)".to_string());
        assert_eq!(
            error.to_string(),
            "Conditional check failed: attribute_exists(id)"
        );
    }

    #[test]
    fn test_store_error_throttled_display() {
        let error = StoreError::Throttled("Throughput exceeded, please retry".to_string());
        assert_eq!(
            error.to_string(),
            "Request throttled: Throughput exceeded, please retry"
        );
    }

    #[test]
    fn test_table_error_not_found_display() {
        let error = TableError::NotFound {
            table: "orders".to_string(),
            key: "id-o1".to_string(),
        };
        assert_eq!(error.to_string(), "Item not found in orders: id-o1");
    }

    #[test]
    fn test_table_error_store_is_transparent() {
        let error: TableError = StoreError::QueryFailed("Table not found".to_string()).into();
        assert_eq!(error.to_string(), "Query failed: Table not found");
        assert!(error.is_store_failure());
        assert!(!error.is_cache_failure());
    }

    #[test]
    fn test_table_error_from_cache_error_is_soft() {
        let error: TableError = CacheError::ConnectionFailed("refused".to_string()).into();
        assert_eq!(
            error.to_string(),
            "Cache write failed: Cache connection failed: refused"
        );
        assert!(error.is_cache_failure());
        assert!(!error.is_store_failure());
    }
}
