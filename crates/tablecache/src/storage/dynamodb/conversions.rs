//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between DynamoDB AttributeValue maps and
//! [`Item`]s. These are testable in isolation without DynamoDB access.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_dynamo::{from_item, to_item};

use tablecache_core::storage::{AttributeNames, Item, ItemsPage, StoreError};

/// DynamoDB's wire representation of a record.
pub type Attributes = HashMap<String, AttributeValue>;

/// Convert an [`Item`] to DynamoDB attributes.
pub fn item_to_attributes(item: &Item) -> Result<Attributes, StoreError> {
    to_item(item).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Convert DynamoDB attributes to an [`Item`].
pub fn attributes_to_item(attributes: Attributes) -> Result<Item, StoreError> {
    from_item(attributes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Expression values, or `None` when there are none.
///
/// DynamoDB rejects empty `ExpressionAttributeValues` maps.
pub fn optional_values(values: &Item) -> Result<Option<Attributes>, StoreError> {
    if values.is_empty() {
        return Ok(None);
    }
    item_to_attributes(values).map(Some)
}

/// Expression names, or `None` when there are none.
pub fn optional_names(names: &AttributeNames) -> Option<HashMap<String, String>> {
    if names.is_empty() {
        None
    } else {
        Some(names.clone())
    }
}

/// Optional continuation key conversion.
pub fn optional_key(key: Option<&Item>) -> Result<Option<Attributes>, StoreError> {
    key.map(item_to_attributes).transpose()
}

/// Assemble an [`ItemsPage`] from the parts shared by Query and Scan output.
pub fn page_from_output(
    items: Option<Vec<Attributes>>,
    count: i32,
    scanned_count: i32,
    last_evaluated_key: Option<Attributes>,
) -> Result<ItemsPage, StoreError> {
    let items = items
        .unwrap_or_default()
        .into_iter()
        .map(attributes_to_item)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ItemsPage {
        count: usize::try_from(count).unwrap_or(items.len()),
        scanned_count: usize::try_from(scanned_count).unwrap_or(items.len()),
        last_evaluated_key: last_evaluated_key.map(attributes_to_item).transpose()?,
        items,
    })
}
