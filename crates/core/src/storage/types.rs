use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::KeyError;

/// A record as exchanged with the table store: attribute name to value.
pub type Item = serde_json::Map<String, Value>;

/// Role of an attribute within a table's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyType {
    /// The partition (hash) attribute.
    Partition,
    /// The optional range (sort) attribute.
    Range,
}

/// One entry of a [`KeySchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: KeyType,
}

impl KeySchemaElement {
    pub fn new(attribute_name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            key_type,
        }
    }
}

/// The primary-key layout of a table.
///
/// Always holds exactly one partition attribute and at most one range
/// attribute. Elements are kept in the order they were supplied; key
/// extraction always renders the partition attribute first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeySchema {
    elements: Vec<KeySchemaElement>,
}

impl KeySchema {
    /// Creates a key schema, validating its shape.
    pub fn new(elements: Vec<KeySchemaElement>) -> Result<Self, KeyError> {
        let partitions = elements
            .iter()
            .filter(|e| e.key_type == KeyType::Partition)
            .count();
        let ranges = elements
            .iter()
            .filter(|e| e.key_type == KeyType::Range)
            .count();

        if partitions != 1 {
            return Err(KeyError::InvalidSchema(format!(
                "expected exactly one partition attribute, found {partitions}"
            )));
        }
        if ranges > 1 {
            return Err(KeyError::InvalidSchema(format!(
                "expected at most one range attribute, found {ranges}"
            )));
        }
        if elements.iter().any(|e| e.attribute_name.is_empty()) {
            return Err(KeyError::InvalidSchema(
                "attribute names must not be empty".to_string(),
            ));
        }
        if let [first, second] = elements.as_slice() {
            if first.attribute_name == second.attribute_name {
                return Err(KeyError::InvalidSchema(format!(
                    "partition and range attributes must differ, both are '{}'",
                    first.attribute_name
                )));
            }
        }

        Ok(Self { elements })
    }

    /// Schema with only a partition attribute.
    pub fn partition(attribute_name: impl Into<String>) -> Self {
        Self {
            elements: vec![KeySchemaElement::new(attribute_name, KeyType::Partition)],
        }
    }

    /// Schema with a partition and a range attribute.
    ///
    /// Fails when both attributes share a name or either name is empty.
    pub fn composite(
        partition: impl Into<String>,
        range: impl Into<String>,
    ) -> Result<Self, KeyError> {
        Self::new(vec![
            KeySchemaElement::new(partition, KeyType::Partition),
            KeySchemaElement::new(range, KeyType::Range),
        ])
    }

    pub fn elements(&self) -> &[KeySchemaElement] {
        &self.elements
    }

    /// Name of the partition attribute.
    pub fn partition_attribute(&self) -> &str {
        self.elements
            .iter()
            .find(|e| e.key_type == KeyType::Partition)
            .map(|e| e.attribute_name.as_str())
            .unwrap_or_default()
    }

    /// Name of the range attribute, if the table has one.
    pub fn range_attribute(&self) -> Option<&str> {
        self.elements
            .iter()
            .find(|e| e.key_type == KeyType::Range)
            .map(|e| e.attribute_name.as_str())
    }

    /// Attribute names in key order: partition first, then range.
    pub fn key_attributes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition_attribute()).chain(self.range_attribute())
    }
}

impl<'de> Deserialize<'de> for KeySchema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let elements = Vec::<KeySchemaElement>::deserialize(deserializer)?;
        KeySchema::new(elements).map_err(serde::de::Error::custom)
    }
}

/// The primary-key attribute values of one record, in key order.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKey {
    attributes: Vec<(String, Value)>,
}

impl PrimaryKey {
    pub(crate) fn new(attributes: Vec<(String, Value)>) -> Self {
        Self { attributes }
    }

    pub fn attributes(&self) -> &[(String, Value)] {
        &self.attributes
    }

    /// The key as an [`Item`], suitable for store lookups.
    pub fn to_item(&self) -> Item {
        self.attributes.iter().cloned().collect()
    }
}

/// Optional expression placeholders shared by several inputs.
pub type AttributeNames = HashMap<String, String>;

/// Point lookup request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetItemInput {
    pub key: Item,
    pub consistent_read: bool,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: AttributeNames,
}

impl GetItemInput {
    pub fn new(key: Item) -> Self {
        Self {
            key,
            ..Default::default()
        }
    }

    pub fn with_consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = consistent_read;
        self
    }

    pub fn with_projection(mut self, expression: impl Into<String>) -> Self {
        self.projection_expression = Some(expression.into());
        self
    }

    pub fn with_name(mut self, placeholder: impl Into<String>, name: impl Into<String>) -> Self {
        self.expression_attribute_names
            .insert(placeholder.into(), name.into());
        self
    }
}

/// Range query request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryInput {
    pub key_condition_expression: String,
    pub index_name: Option<String>,
    pub filter_expression: Option<String>,
    pub expression_attribute_names: AttributeNames,
    pub expression_attribute_values: Item,
    pub consistent_read: bool,
    pub limit: Option<i32>,
    pub exclusive_start_key: Option<Item>,
    pub scan_index_forward: bool,
}

impl QueryInput {
    pub fn new(key_condition_expression: impl Into<String>) -> Self {
        Self {
            key_condition_expression: key_condition_expression.into(),
            index_name: None,
            filter_expression: None,
            expression_attribute_names: AttributeNames::new(),
            expression_attribute_values: Item::new(),
            consistent_read: false,
            limit: None,
            exclusive_start_key: None,
            scan_index_forward: true,
        }
    }

    pub fn with_index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn with_filter(mut self, expression: impl Into<String>) -> Self {
        self.filter_expression = Some(expression.into());
        self
    }

    pub fn with_name(mut self, placeholder: impl Into<String>, name: impl Into<String>) -> Self {
        self.expression_attribute_names
            .insert(placeholder.into(), name.into());
        self
    }

    pub fn with_value(mut self, placeholder: impl Into<String>, value: impl Into<Value>) -> Self {
        self.expression_attribute_values
            .insert(placeholder.into(), value.into());
        self
    }

    pub fn with_consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = consistent_read;
        self
    }

    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_start_key(mut self, key: Item) -> Self {
        self.exclusive_start_key = Some(key);
        self
    }

    /// Returns results in descending range-key order.
    pub fn descending(mut self) -> Self {
        self.scan_index_forward = false;
        self
    }
}

/// Full or filtered table scan request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanInput {
    pub index_name: Option<String>,
    pub filter_expression: Option<String>,
    pub expression_attribute_names: AttributeNames,
    pub expression_attribute_values: Item,
    pub consistent_read: bool,
    pub limit: Option<i32>,
    pub exclusive_start_key: Option<Item>,
}

impl ScanInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn with_filter(mut self, expression: impl Into<String>) -> Self {
        self.filter_expression = Some(expression.into());
        self
    }

    pub fn with_name(mut self, placeholder: impl Into<String>, name: impl Into<String>) -> Self {
        self.expression_attribute_names
            .insert(placeholder.into(), name.into());
        self
    }

    pub fn with_value(mut self, placeholder: impl Into<String>, value: impl Into<Value>) -> Self {
        self.expression_attribute_values
            .insert(placeholder.into(), value.into());
        self
    }

    pub fn with_consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = consistent_read;
        self
    }

    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_start_key(mut self, key: Item) -> Self {
        self.exclusive_start_key = Some(key);
        self
    }
}

/// A conditional-write guard for puts.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub expression: String,
    pub expression_attribute_names: AttributeNames,
    pub expression_attribute_values: Item,
}

impl Condition {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            expression_attribute_names: AttributeNames::new(),
            expression_attribute_values: Item::new(),
        }
    }

    pub fn with_name(mut self, placeholder: impl Into<String>, name: impl Into<String>) -> Self {
        self.expression_attribute_names
            .insert(placeholder.into(), name.into());
        self
    }

    pub fn with_value(mut self, placeholder: impl Into<String>, value: impl Into<Value>) -> Self {
        self.expression_attribute_values
            .insert(placeholder.into(), value.into());
        self
    }
}

/// Partial attribute update of a single record.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub key: Item,
    pub update_expression: String,
    pub expression_attribute_names: AttributeNames,
    pub expression_attribute_values: Item,
    pub condition_expression: Option<String>,
}

impl UpdateRequest {
    pub fn new(key: Item, update_expression: impl Into<String>) -> Self {
        Self {
            key,
            update_expression: update_expression.into(),
            expression_attribute_names: AttributeNames::new(),
            expression_attribute_values: Item::new(),
            condition_expression: None,
        }
    }

    pub fn with_name(mut self, placeholder: impl Into<String>, name: impl Into<String>) -> Self {
        self.expression_attribute_names
            .insert(placeholder.into(), name.into());
        self
    }

    pub fn with_value(mut self, placeholder: impl Into<String>, value: impl Into<Value>) -> Self {
        self.expression_attribute_values
            .insert(placeholder.into(), value.into());
        self
    }

    pub fn with_condition(mut self, expression: impl Into<String>) -> Self {
        self.condition_expression = Some(expression.into());
        self
    }
}

/// One page of query or scan results as reported by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemsPage {
    pub items: Vec<Item>,
    /// Number of items returned after filtering.
    pub count: usize,
    /// Number of items evaluated before filtering.
    pub scanned_count: usize,
    /// Continuation token; `None` when the result set is exhausted.
    pub last_evaluated_key: Option<Item>,
}

/// Typed query or scan results with their pagination metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemsDetails<T> {
    pub items: Vec<T>,
    pub count: usize,
    pub scanned_count: usize,
    pub last_evaluated_key: Option<Item>,
}

impl<T> ItemsDetails<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
