//! Typed table operations with read-through and write-through caching.
//!
//! A [`TableDefinition`] holds the static configuration of one table. Binding
//! it to a request with [`TableDefinition::initialize`] yields a [`Table`],
//! the only type that exposes table operations.
//!
//! The store is the operation of record: it always runs first and a store
//! failure skips the cache step. A TTL of zero counts as no TTL.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use tablecache_core::cache::{
    build_items_cache_map, build_key, record_to_item, Cache, CACHE_KEY_PREFIX,
};
use tablecache_core::storage::{
    Condition, GetItemInput, Item, ItemsDetails, ItemsPage, KeyError, KeySchema, QueryInput,
    ScanInput, StoreError, TableError, TableStore, UpdateRequest,
};

use crate::context::RequestContext;
use crate::storage::cached::{effective_ttl, CacheStats, CacheThroughStore, DEFAULT_CACHE_TTL};

/// Static configuration of a table of `T` records stored in `S`.
///
/// Cheap to clone; clones share the store and the cache statistics.
pub struct TableDefinition<T, S> {
    table_name: String,
    key_schema: KeySchema,
    store: Arc<S>,
    prefix: String,
    default_ttl: Duration,
    stats: Arc<CacheStats>,
    _record: PhantomData<fn() -> T>,
}

impl<T, S> Clone for TableDefinition<T, S> {
    fn clone(&self) -> Self {
        Self {
            table_name: self.table_name.clone(),
            key_schema: self.key_schema.clone(),
            store: Arc::clone(&self.store),
            prefix: self.prefix.clone(),
            default_ttl: self.default_ttl,
            stats: Arc::clone(&self.stats),
            _record: PhantomData,
        }
    }
}

impl<T, S> TableDefinition<T, S>
where
    S: TableStore,
{
    pub fn new(table_name: impl Into<String>, key_schema: KeySchema, store: Arc<S>) -> Self {
        Self {
            table_name: table_name.into(),
            key_schema,
            store,
            prefix: CACHE_KEY_PREFIX.to_string(),
            default_ttl: DEFAULT_CACHE_TTL,
            stats: Arc::new(CacheStats::new()),
            _record: PhantomData,
        }
    }

    /// Overrides the cache key prefix (default: `"sup:"`).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Overrides the TTL used when a cache write is requested without one.
    pub fn with_default_ttl(mut self, default_ttl: Duration) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    pub fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    /// Binds a request context and an optional cache, producing a usable table.
    ///
    /// With `cache` set to `None` every read goes to the store and nothing is
    /// cached.
    pub fn initialize<C: Cache>(
        &self,
        context: RequestContext,
        cache: Option<Arc<C>>,
    ) -> Table<T, S, C> {
        let inner = CacheThroughStore::new(
            Arc::clone(&self.store),
            cache,
            self.table_name.clone(),
            self.key_schema.clone(),
        )
        .with_prefix(self.prefix.clone())
        .with_default_ttl(self.default_ttl)
        .with_stats(Arc::clone(&self.stats));

        Table {
            inner,
            context,
            _record: PhantomData,
        }
    }
}

#[cfg(feature = "dynamodb")]
impl<T> TableDefinition<T, crate::storage::dynamodb::DynamoDbStore> {
    /// Creates a definition backed by DynamoDB, from a ready client or from
    /// connection parameters.
    pub async fn connect(
        table_name: impl Into<String>,
        key_schema: KeySchema,
        connection: crate::storage::dynamodb::DynamoDbConnection,
    ) -> Self {
        let store = crate::storage::dynamodb::DynamoDbStore::connect(connection).await;
        Self::new(table_name, key_schema, Arc::new(store))
    }
}

/// A table bound to a request, exposing the cached operation set.
pub struct Table<T, S, C> {
    inner: CacheThroughStore<S, C>,
    context: RequestContext,
    _record: PhantomData<fn() -> T>,
}

impl<T, S, C> Clone for Table<T, S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            context: self.context.clone(),
            _record: PhantomData,
        }
    }
}

fn from_item<T: DeserializeOwned>(item: Item) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(item))
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Appends `condition` to `request`, joining existing conditions with `AND`.
fn with_condition(request: &UpdateRequest, condition: &Condition) -> UpdateRequest {
    let mut guarded = request.clone();
    guarded.condition_expression = Some(match &request.condition_expression {
        Some(existing) => format!("({existing}) AND ({})", condition.expression),
        None => condition.expression.clone(),
    });
    guarded
        .expression_attribute_names
        .extend(condition.expression_attribute_names.clone());
    guarded.expression_attribute_values.extend(
        condition
            .expression_attribute_values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    guarded
}

impl<T, S, C> Table<T, S, C>
where
    T: Serialize + DeserializeOwned + Send + Sync,
    S: TableStore,
    C: Cache,
{
    pub fn table_name(&self) -> &str {
        self.inner.table_name()
    }

    pub fn key_schema(&self) -> &KeySchema {
        self.inner.key_schema()
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn stats(&self) -> &Arc<CacheStats> {
        self.inner.stats()
    }

    /// The cache-through store behind this table.
    pub fn cache_through(&self) -> &CacheThroughStore<S, C> {
        &self.inner
    }

    /// Cache key under which the record identified by `key` is cached.
    pub fn cache_key(&self, key: &Item) -> Result<String, KeyError> {
        let primary_key = build_key(self.key_schema(), key)?;
        Ok(self.inner.cache_key(&primary_key))
    }

    /// Point lookup, served from the cache when possible.
    ///
    /// See [`CacheThroughStore::get_item`].
    pub async fn get_item(
        &self,
        input: &GetItemInput,
        ttl: Option<Duration>,
    ) -> Result<T, TableError> {
        self.inner.get_item(input, ttl).await
    }

    /// Runs a query against the store and returns the matching records.
    pub async fn query(
        &self,
        input: &QueryInput,
        ttl: Option<Duration>,
    ) -> Result<Vec<T>, TableError> {
        Ok(self.query_details(input, ttl).await?.items)
    }

    /// Runs a query against the store, keeping pagination metadata.
    ///
    /// The store is always queried. With a TTL, every returned record is
    /// written to the cache under its own key.
    pub async fn query_details(
        &self,
        input: &QueryInput,
        ttl: Option<Duration>,
    ) -> Result<ItemsDetails<T>, TableError> {
        let page = self.inner.store().query(self.table_name(), input).await?;
        let details = self.to_details(page)?;
        self.populate(&details.items, ttl).await?;

        tracing::debug!(
            table = %self.table_name(),
            request_id = %self.context.request_id,
            count = details.count,
            scanned_count = details.scanned_count,
            "Query completed"
        );
        Ok(details)
    }

    /// Scans the table and returns the matching records.
    pub async fn scan(
        &self,
        input: &ScanInput,
        ttl: Option<Duration>,
    ) -> Result<Vec<T>, TableError> {
        Ok(self.scan_details(input, ttl).await?.items)
    }

    /// Scans the table, keeping pagination metadata. Caches like
    /// [`Table::query_details`].
    pub async fn scan_details(
        &self,
        input: &ScanInput,
        ttl: Option<Duration>,
    ) -> Result<ItemsDetails<T>, TableError> {
        let page = self.inner.store().scan(self.table_name(), input).await?;
        let details = self.to_details(page)?;
        self.populate(&details.items, ttl).await?;

        tracing::debug!(
            table = %self.table_name(),
            request_id = %self.context.request_id,
            count = details.count,
            scanned_count = details.scanned_count,
            "Scan completed"
        );
        Ok(details)
    }

    /// Inserts or overwrites `record`, optionally guarded by `condition`.
    ///
    /// With a TTL the record is then cached under its derived key.
    ///
    /// # Errors
    ///
    /// - [`TableError::Key`] when the record lacks its key attributes; the
    ///   store is not called
    /// - [`TableError::Store`] when the store rejects the write, including a
    ///   failed condition
    /// - [`TableError::CacheWrite`] when the store write succeeded but the
    ///   cache write did not
    pub async fn put(
        &self,
        record: &T,
        ttl: Option<Duration>,
        condition: Option<&Condition>,
    ) -> Result<(), TableError> {
        let item = record_to_item(record)?;
        let cache_key = self.inner.cache_key(&build_key(self.key_schema(), &item)?);

        self.inner
            .store()
            .put(self.table_name(), item, condition)
            .await?;

        tracing::debug!(
            table = %self.table_name(),
            request_id = %self.context.request_id,
            cache_key,
            "Record stored"
        );

        if let Some(ttl) = effective_ttl(ttl) {
            self.inner.set_in_cache(&cache_key, record, Some(ttl)).await?;
        }

        Ok(())
    }

    /// Applies a partial update and returns the record after the update.
    ///
    /// With a TTL and a returned record, the record is cached under the key
    /// derived from `request.key`.
    pub async fn update(
        &self,
        request: &UpdateRequest,
        ttl: Option<Duration>,
    ) -> Result<Option<T>, TableError> {
        let primary_key = build_key(self.key_schema(), &request.key)?;
        let updated = self
            .inner
            .store()
            .update(self.table_name(), request)
            .await?
            .map(from_item::<T>)
            .transpose()?;

        tracing::debug!(
            table = %self.table_name(),
            request_id = %self.context.request_id,
            returned = updated.is_some(),
            "Record updated"
        );

        if let (Some(record), Some(ttl)) = (&updated, effective_ttl(ttl)) {
            let cache_key = self.inner.cache_key(&primary_key);
            self.inner.set_in_cache(&cache_key, record, Some(ttl)).await?;
        }

        Ok(updated)
    }

    /// Like [`Table::update`], but the store rejects the update with
    /// [`StoreError::ConditionalCheckFailed`] unless `condition` holds.
    pub async fn update_conditional(
        &self,
        request: &UpdateRequest,
        condition: &Condition,
        ttl: Option<Duration>,
    ) -> Result<Option<T>, TableError> {
        self.update(&with_condition(request, condition), ttl).await
    }

    /// Deletes the record identified by `key`, then drops its cached copy.
    pub async fn delete(&self, key: &Item) -> Result<(), TableError> {
        let primary_key = build_key(self.key_schema(), key)?;

        self.inner
            .store()
            .delete(self.table_name(), &primary_key.to_item())
            .await?;

        let existed = self
            .inner
            .remove_item_from_cache(self.table_name(), &primary_key)
            .await?;

        tracing::debug!(
            table = %self.table_name(),
            request_id = %self.context.request_id,
            was_cached = existed,
            "Record deleted"
        );
        Ok(())
    }

    fn to_details(&self, page: ItemsPage) -> Result<ItemsDetails<T>, StoreError> {
        let items = page
            .items
            .into_iter()
            .map(from_item)
            .collect::<Result<Vec<T>, _>>()?;

        Ok(ItemsDetails {
            items,
            count: page.count,
            scanned_count: page.scanned_count,
            last_evaluated_key: page.last_evaluated_key,
        })
    }

    async fn populate(&self, records: &[T], ttl: Option<Duration>) -> Result<(), TableError> {
        let Some(ttl) = effective_ttl(ttl) else {
            return Ok(());
        };
        if records.is_empty() {
            return Ok(());
        }

        let items = build_items_cache_map(
            self.inner.prefix(),
            self.table_name(),
            self.key_schema(),
            records,
        )?;
        self.inner.set_items_in_cache(&items, Some(ttl)).await?;
        Ok(())
    }
}
