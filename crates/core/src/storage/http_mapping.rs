//! Pure functions for mapping table errors to HTTP status codes.
//!
//! The core only reports [`TableError`] values; request-serving layers use
//! this mapping to translate them into their own error conventions.

use super::{StoreError, TableError};

/// Maps a [`TableError`] to an HTTP status code.
///
/// - `NotFound` -> 404 (Not Found)
/// - `Key` -> 400 (Bad Request)
/// - `Store(ConditionalCheckFailed)` -> 409 (Conflict)
/// - `Store(Throttled)` -> 429 (Too Many Requests)
/// - `Store(ConnectionFailed)` -> 503 (Service Unavailable)
/// - `Store(InvalidExpression)` -> 400 (Bad Request)
/// - everything else -> 500 (Internal Server Error)
///
/// # Examples
///
/// ```
/// use tablecache_core::storage::{table_error_to_status_code, TableError};
///
/// let error = TableError::NotFound {
///     table: "orders".to_string(),
///     key: "id-o1".to_string(),
/// };
/// assert_eq!(table_error_to_status_code(&error), 404);
/// ```
pub fn table_error_to_status_code(error: &TableError) -> u16 {
    match error {
        TableError::NotFound { .. } => 404,
        TableError::Key(_) => 400,
        TableError::CacheWrite(_) => 500,
        TableError::Store(store) => match store {
            StoreError::ConditionalCheckFailed(_) => 409,
            StoreError::Throttled(_) => 429,
            StoreError::ConnectionFailed(_) => 503,
            StoreError::InvalidExpression(_) => 400,
            StoreError::QueryFailed(_) => 500,
            StoreError::Serialization(_) => 500,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheError;
    use crate::storage::KeyError;

    #[test]
    fn test_not_found_maps_to_404() {
        let error = TableError::NotFound {
            table: "orders".to_string(),
            key: "id-o1".to_string(),
        };
        assert_eq!(table_error_to_status_code(&error), 404);
    }

    #[test]
    fn test_key_error_maps_to_400() {
        let error = TableError::Key(KeyError::MissingAttribute {
            attribute: "id".to_string(),
        });
        assert_eq!(table_error_to_status_code(&error), 400);
    }

    #[test]
    fn test_conditional_check_maps_to_409() {
        let error = TableError::Store(StoreError::ConditionalCheckFailed(
            "attribute_not_exists(id)".to_string(),
        ));
        assert_eq!(table_error_to_status_code(&error), 409);
    }

    #[test]
    fn test_throttled_maps_to_429() {
        let error = TableError::Store(StoreError::Throttled("slow down".to_string()));
        assert_eq!(table_error_to_status_code(&error), 429);
    }

    #[test]
    fn test_connection_failed_maps_to_503() {
        let error = TableError::Store(StoreError::ConnectionFailed("timeout".to_string()));
        assert_eq!(table_error_to_status_code(&error), 503);
    }

    #[test]
    fn test_cache_write_maps_to_500() {
        let error = TableError::CacheWrite(CacheError::OperationFailed("boom".to_string()));
        assert_eq!(table_error_to_status_code(&error), 500);
    }

    #[test]
    fn test_query_failed_maps_to_500() {
        let error = TableError::Store(StoreError::QueryFailed("internal".to_string()));
        assert_eq!(table_error_to_status_code(&error), 500);
    }
}
