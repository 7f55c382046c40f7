//! Pure functions deriving cache keys from primary keys.
//!
//! A cache key has the shape `{prefix}{table}:{name}-{value}[-{name}-{value}]`,
//! with the partition attribute always rendered before the range attribute.
//! The same record always maps to the same key, so any component can
//! re-derive a record's cache key from the record alone.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::storage::{Item, KeyError, KeySchema, PrimaryKey};

/// Default prefix for every cache key written by this crate.
pub const CACHE_KEY_PREFIX: &str = "sup:";

/// Extracts the primary-key attributes of `item` according to `schema`.
///
/// # Errors
///
/// Returns [`KeyError::MissingAttribute`] when `item` lacks one of the key
/// attributes.
pub fn build_key(schema: &KeySchema, item: &Item) -> Result<PrimaryKey, KeyError> {
    let attributes = schema
        .key_attributes()
        .map(|name| {
            item.get(name)
                .filter(|value| !value.is_null())
                .map(|value| (name.to_string(), value.clone()))
                .ok_or_else(|| KeyError::MissingAttribute {
                    attribute: name.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PrimaryKey::new(attributes))
}

/// Builds the cache key for a primary key of `table_name`.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tablecache_core::cache::{build_cache_key, build_key, CACHE_KEY_PREFIX};
/// use tablecache_core::storage::KeySchema;
///
/// let schema = KeySchema::partition("id");
/// let item = json!({"id": "o1", "total": 10}).as_object().unwrap().clone();
/// let key = build_key(&schema, &item).unwrap();
///
/// assert_eq!(build_cache_key(CACHE_KEY_PREFIX, "orders", &key), "sup:orders:id-o1");
/// ```
pub fn build_cache_key(prefix: &str, table_name: &str, key: &PrimaryKey) -> String {
    let fragments: Vec<String> = key
        .attributes()
        .iter()
        .map(|(name, value)| format!("{}-{}", name, render_value(value)))
        .collect();

    format!("{}{}:{}", prefix, table_name, fragments.join("-"))
}

/// Maps every record to its cache key.
///
/// Duplicate primary keys within `records` collapse into one entry; the last
/// record wins. An empty slice yields an empty map.
pub fn build_items_cache_map<'a, T: Serialize>(
    prefix: &str,
    table_name: &str,
    schema: &KeySchema,
    records: &'a [T],
) -> Result<HashMap<String, &'a T>, KeyError> {
    let mut map = HashMap::with_capacity(records.len());

    for record in records {
        let cache_key = cache_key_for_record(prefix, table_name, schema, record)?;
        map.insert(cache_key, record);
    }

    Ok(map)
}

/// Derives the cache key of a typed record.
pub fn cache_key_for_record<T: Serialize>(
    prefix: &str,
    table_name: &str,
    schema: &KeySchema,
    record: &T,
) -> Result<String, KeyError> {
    let item = record_to_item(record)?;
    let key = build_key(schema, &item)?;
    Ok(build_cache_key(prefix, table_name, &key))
}

/// Converts a typed record into an [`Item`].
///
/// # Errors
///
/// Returns [`KeyError::NotAnObject`] when the record does not serialize to a
/// map of attributes.
pub fn record_to_item<T: Serialize>(record: &T) -> Result<Item, KeyError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(item)) => Ok(item),
        Ok(other) => Err(KeyError::NotAnObject(value_kind(&other).to_string())),
        Err(e) => Err(KeyError::NotAnObject(e.to_string())),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
