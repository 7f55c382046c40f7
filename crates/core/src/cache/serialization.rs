//! Pure functions for serializing/deserializing records to/from cache bytes.
//!
//! Cache values are JSON so that entries stay human-readable and easy to
//! inspect with the cache store's own tooling.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during cache serialization/deserialization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializationError {
    /// Failed to serialize a value to bytes.
    #[error("Failed to serialize: {0}")]
    SerializeFailed(String),
    /// Failed to deserialize bytes to a value.
    #[error("Failed to deserialize: {0}")]
    DeserializeFailed(String),
}

/// Result type for serialization operations.
pub type Result<T> = std::result::Result<T, SerializationError>;

/// Serializes a record to JSON bytes.
pub fn serialize_record<T: Serialize + ?Sized>(record: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| SerializationError::SerializeFailed(e.to_string()))
}

/// Deserializes JSON bytes to a record.
pub fn deserialize_record<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| SerializationError::DeserializeFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: String,
        total: i64,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        note: Option<String>,
    }

    fn order() -> Order {
        Order {
            id: "o1".to_string(),
            total: 10,
            note: None,
        }
    }

    #[test]
    fn test_serialize_record_is_compact_json() {
        let bytes = serialize_record(&order()).expect("serialize should succeed");

        assert_eq!(bytes, br#"{"id":"o1","total":10}"#);
    }

    #[test]
    fn test_deserialize_record() {
        let order: Order =
            deserialize_record(br#"{"id":"o1","total":10,"note":"gift"}"#).expect("valid JSON");

        assert_eq!(order.note.as_deref(), Some("gift"));
        assert_eq!(order.total, 10);
    }

    #[test]
    fn test_deserialize_malformed_json() {
        let result = deserialize_record::<Order>(b"not valid json {{{");

        assert!(matches!(
            result,
            Err(SerializationError::DeserializeFailed(_))
        ));
    }

    #[test]
    fn test_deserialize_wrong_shape() {
        let result = deserialize_record::<Order>(br#"{"id":"o1"}"#);

        assert!(matches!(
            result,
            Err(SerializationError::DeserializeFailed(_))
        ));
    }

    #[test]
    fn test_serialization_error_display() {
        let error = SerializationError::DeserializeFailed("EOF".to_string());
        assert_eq!(error.to_string(), "Failed to deserialize: EOF");
    }
}
