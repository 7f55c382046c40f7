//! In-memory table store implementation.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tablecache_core::cache::{build_cache_key, build_key};
use tablecache_core::storage::{
    AttributeNames, Condition, GetItemInput, Item, ItemsPage, KeySchema, PrimaryKey, QueryInput,
    Result, ScanInput, StoreError, TableStore, UpdateRequest,
};

use super::expression::{
    apply_update, compare_values, parse_condition, parse_projection, parse_update, ConditionExpr,
};

#[derive(Debug, Clone)]
struct TableData {
    schema: KeySchema,
    items: HashMap<String, Item>,
}

impl TableData {
    fn new(schema: KeySchema) -> Self {
        Self {
            schema,
            items: HashMap::new(),
        }
    }

    /// Resolves a key-only item to its primary key and storage slot.
    fn locate(&self, table_name: &str, key: &Item) -> Result<(PrimaryKey, String)> {
        let primary_key = build_key(&self.schema, key).map_err(|_| schema_mismatch())?;
        if key.len() != primary_key.attributes().len() {
            return Err(schema_mismatch());
        }
        let slot = build_cache_key("", table_name, &primary_key);
        Ok((primary_key, slot))
    }

    fn slot_of(&self, table_name: &str, item: &Item) -> Result<String> {
        let primary_key = build_key(&self.schema, item).map_err(|e| {
            StoreError::QueryFailed(format!("One or more parameter values were invalid: {e}"))
        })?;
        Ok(build_cache_key("", table_name, &primary_key))
    }

    fn key_item(&self, item: &Item) -> Item {
        self.schema
            .key_attributes()
            .filter_map(|name| item.get(name).map(|v| (name.to_string(), v.clone())))
            .collect()
    }
}

fn schema_mismatch() -> StoreError {
    StoreError::QueryFailed("The provided key element does not match the schema".to_string())
}

fn table_not_found(table_name: &str) -> StoreError {
    StoreError::QueryFailed(format!("Table not found: {table_name}"))
}

fn conditional_check_failed() -> StoreError {
    StoreError::ConditionalCheckFailed("The conditional request failed".to_string())
}

fn unsupported_index(index_name: &str, table_name: &str) -> StoreError {
    StoreError::QueryFailed(format!(
        "Index {index_name} not found on table {table_name}"
    ))
}

/// In-memory [`TableStore`] for tests and local runs.
///
/// Tables must be registered with their key schema before use; operations on
/// an unknown table fail the way a missing remote table does. Secondary
/// indexes are not supported. Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, TableData>>>,
}

impl InMemoryStore {
    /// Creates a store with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given tables already registered.
    pub fn with_tables<I, N>(tables: I) -> Self
    where
        I: IntoIterator<Item = (N, KeySchema)>,
        N: Into<String>,
    {
        let tables = tables
            .into_iter()
            .map(|(name, schema)| (name.into(), TableData::new(schema)))
            .collect();

        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    /// Registers a new, empty table.
    ///
    /// # Errors
    ///
    /// Fails when a table with the same name already exists.
    pub async fn create_table(
        &self,
        table_name: impl Into<String>,
        schema: KeySchema,
    ) -> Result<()> {
        let table_name = table_name.into();
        let mut tables = self.tables.write().await;
        if tables.contains_key(&table_name) {
            return Err(StoreError::QueryFailed(format!(
                "Table already exists: {table_name}"
            )));
        }
        tables.insert(table_name, TableData::new(schema));
        Ok(())
    }

    /// Number of items stored in `table_name`, or 0 for an unknown table.
    pub async fn item_count(&self, table_name: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table_name)
            .map_or(0, |table| table.items.len())
    }
}

/// Index of the first candidate ordered after the exclusive start key.
///
/// The start key need not be among the candidates; it may have been deleted
/// or filtered out since the previous page.
fn resume_index(candidates: &[&Item], is_after: impl Fn(&Item) -> bool) -> usize {
    candidates
        .iter()
        .position(|&item| is_after(item))
        .unwrap_or(candidates.len())
}

/// Applies pagination, the filter and the counts to already ordered candidates.
fn paginate(
    table: &TableData,
    candidates: Vec<&Item>,
    start: usize,
    filter: Option<&ConditionExpr>,
    limit: Option<i32>,
) -> Result<ItemsPage> {
    let limit = match limit {
        Some(limit) if limit < 1 => {
            return Err(StoreError::QueryFailed(
                "Limit must be greater than or equal to 1".to_string(),
            ))
        }
        Some(limit) => Some(limit as usize),
        None => None,
    };

    let remaining = &candidates[start.min(candidates.len())..];
    let evaluated = match limit {
        Some(limit) => &remaining[..limit.min(remaining.len())],
        None => remaining,
    };

    let last_evaluated_key = match evaluated.last() {
        Some(last) if evaluated.len() < remaining.len() => Some(table.key_item(last)),
        _ => None,
    };

    let items: Vec<Item> = evaluated
        .iter()
        .filter(|item| filter.map_or(true, |f| f.evaluate(item)))
        .map(|item| (*item).clone())
        .collect();

    Ok(ItemsPage {
        count: items.len(),
        scanned_count: evaluated.len(),
        items,
        last_evaluated_key,
    })
}

fn parse_filter(
    expression: Option<&str>,
    input_names: &AttributeNames,
    input_values: &Item,
) -> Result<Option<ConditionExpr>> {
    expression
        .map(|e| parse_condition(e, input_names, input_values))
        .transpose()
}

#[async_trait]
impl TableStore for InMemoryStore {
    async fn get(&self, table_name: &str, input: &GetItemInput) -> Result<Option<Item>> {
        let tables = self.tables.read().await;
        let table = tables
            .get(table_name)
            .ok_or_else(|| table_not_found(table_name))?;
        let (_, slot) = table.locate(table_name, &input.key)?;

        let Some(item) = table.items.get(&slot) else {
            return Ok(None);
        };

        match &input.projection_expression {
            Some(projection) => {
                let attributes = parse_projection(projection, &input.expression_attribute_names)?;
                Ok(Some(
                    attributes
                        .into_iter()
                        .filter_map(|name| item.get(&name).map(|v| (name, v.clone())))
                        .collect(),
                ))
            }
            None => Ok(Some(item.clone())),
        }
    }

    async fn query(&self, table_name: &str, input: &QueryInput) -> Result<ItemsPage> {
        let tables = self.tables.read().await;
        let table = tables
            .get(table_name)
            .ok_or_else(|| table_not_found(table_name))?;
        if let Some(index_name) = &input.index_name {
            return Err(unsupported_index(index_name, table_name));
        }

        let names = &input.expression_attribute_names;
        let values = &input.expression_attribute_values;
        let key_condition = parse_condition(&input.key_condition_expression, names, values)?;
        key_condition.require_equality_on(table.schema.partition_attribute())?;
        let filter = parse_filter(input.filter_expression.as_deref(), names, values)?;

        let mut candidates: Vec<&Item> = table
            .items
            .values()
            .filter(|item| key_condition.evaluate(item))
            .collect();

        if let Some(range) = table.schema.range_attribute() {
            candidates.sort_by(|a, b| match (a.get(range), b.get(range)) {
                (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            });
        }
        if !input.scan_index_forward {
            candidates.reverse();
        }

        let start = match &input.exclusive_start_key {
            Some(start_key) => {
                table.locate(table_name, start_key)?;
                match table.schema.range_attribute() {
                    Some(range) => {
                        let start_value = start_key.get(range).ok_or_else(schema_mismatch)?;
                        let wanted = if input.scan_index_forward {
                            Ordering::Greater
                        } else {
                            Ordering::Less
                        };
                        resume_index(&candidates, |item| {
                            item.get(range)
                                .and_then(|value| compare_values(value, start_value))
                                .is_some_and(|ordering| ordering == wanted)
                        })
                    }
                    // A partition holds a single item without a range key.
                    None => candidates.len(),
                }
            }
            None => 0,
        };

        paginate(table, candidates, start, filter.as_ref(), input.limit)
    }

    async fn scan(&self, table_name: &str, input: &ScanInput) -> Result<ItemsPage> {
        let tables = self.tables.read().await;
        let table = tables
            .get(table_name)
            .ok_or_else(|| table_not_found(table_name))?;
        if let Some(index_name) = &input.index_name {
            return Err(unsupported_index(index_name, table_name));
        }

        let filter = parse_filter(
            input.filter_expression.as_deref(),
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )?;

        // Slot order keeps pagination stable between calls.
        let mut slots: Vec<&String> = table.items.keys().collect();
        slots.sort();
        let candidates: Vec<&Item> = slots
            .into_iter()
            .filter_map(|slot| table.items.get(slot))
            .collect();

        let start = match &input.exclusive_start_key {
            Some(start_key) => {
                let (_, start_slot) = table.locate(table_name, start_key)?;
                resume_index(&candidates, |item| {
                    table
                        .slot_of(table_name, item)
                        .is_ok_and(|slot| slot > start_slot)
                })
            }
            None => 0,
        };

        paginate(table, candidates, start, filter.as_ref(), input.limit)
    }

    async fn put(
        &self,
        table_name: &str,
        item: Item,
        condition: Option<&Condition>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| table_not_found(table_name))?;
        let slot = table.slot_of(table_name, &item)?;

        if let Some(condition) = condition {
            let expr = parse_condition(
                &condition.expression,
                &condition.expression_attribute_names,
                &condition.expression_attribute_values,
            )?;
            let existing = table.items.get(&slot).cloned().unwrap_or_default();
            if !expr.evaluate(&existing) {
                return Err(conditional_check_failed());
            }
        }

        table.items.insert(slot, item);
        Ok(())
    }

    async fn update(&self, table_name: &str, request: &UpdateRequest) -> Result<Option<Item>> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| table_not_found(table_name))?;
        let (primary_key, slot) = table.locate(table_name, &request.key)?;

        let names = &request.expression_attribute_names;
        let values = &request.expression_attribute_values;
        let actions = parse_update(&request.update_expression, names, values)?;
        if let Some(action) = actions
            .iter()
            .find(|a| table.schema.key_attributes().any(|k| k == a.attribute()))
        {
            return Err(StoreError::InvalidExpression(format!(
                "Cannot update attribute {}. This attribute is part of the key",
                action.attribute()
            )));
        }

        let existing = table.items.get(&slot).cloned();
        if let Some(expression) = &request.condition_expression {
            let expr = parse_condition(expression, names, values)?;
            if !expr.evaluate(existing.as_ref().unwrap_or(&Item::new())) {
                return Err(conditional_check_failed());
            }
        }

        let mut updated = existing.unwrap_or_else(|| primary_key.to_item());
        apply_update(&mut updated, &actions)?;
        table.items.insert(slot, updated.clone());

        Ok(Some(updated))
    }

    async fn delete(&self, table_name: &str, key: &Item) -> Result<()> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| table_not_found(table_name))?;
        let (_, slot) = table.locate(table_name, key)?;

        table.items.remove(&slot);
        Ok(())
    }
}
