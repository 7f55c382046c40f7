//! Read-through / write-through cache in front of a table store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use tablecache_core::cache::{
    build_cache_key, build_key, deserialize_record, serialize_record, Cache, CacheError,
    CACHE_KEY_PREFIX,
};
use tablecache_core::storage::{
    GetItemInput, KeySchema, PrimaryKey, StoreError, TableError, TableStore,
};

use super::stats::CacheStats;

/// TTL applied by [`CacheThroughStore::set_in_cache`] when none is given.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Normalizes a per-call TTL: zero means no TTL.
pub(crate) fn effective_ttl(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|ttl| !ttl.is_zero())
}

/// Cache-through decorator for one table.
///
/// Reads consult the cache before the store and populate it on a miss when a
/// TTL is given. Writes go to the store first and are mirrored into the cache
/// afterwards. Without a bound cache every lookup is a miss and every cache
/// write or removal is a no-op.
///
/// # Type Parameters
///
/// * `S` - The backing table store
/// * `C` - The cache implementation
pub struct CacheThroughStore<S, C> {
    store: Arc<S>,
    cache: Option<Arc<C>>,
    table_name: String,
    key_schema: KeySchema,
    prefix: String,
    default_ttl: Duration,
    stats: Arc<CacheStats>,
}

impl<S, C> Clone for CacheThroughStore<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
            table_name: self.table_name.clone(),
            key_schema: self.key_schema.clone(),
            prefix: self.prefix.clone(),
            default_ttl: self.default_ttl,
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<S, C> CacheThroughStore<S, C>
where
    S: TableStore,
    C: Cache,
{
    /// Creates a cache-through store with the default prefix and TTL.
    pub fn new(
        store: Arc<S>,
        cache: Option<Arc<C>>,
        table_name: impl Into<String>,
        key_schema: KeySchema,
    ) -> Self {
        Self {
            store,
            cache,
            table_name: table_name.into(),
            key_schema,
            prefix: CACHE_KEY_PREFIX.to_string(),
            default_ttl: DEFAULT_CACHE_TTL,
            stats: Arc::new(CacheStats::new()),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_default_ttl(mut self, default_ttl: Duration) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    pub fn with_stats(mut self, stats: Arc<CacheStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> Option<&Arc<C>> {
        self.cache.as_ref()
    }

    /// Cache key of `key` in this store's table.
    pub fn cache_key(&self, key: &PrimaryKey) -> String {
        build_cache_key(&self.prefix, &self.table_name, key)
    }

    /// Point lookup, cache first.
    ///
    /// The cache is always consulted. On a miss the store is read; a record
    /// found there is written back to the cache only when `ttl` is set.
    /// Projected reads go straight to the store and never touch the cache,
    /// whose entries hold whole records.
    ///
    /// # Errors
    ///
    /// - [`TableError::NotFound`] when neither the cache nor the store has the record
    /// - [`TableError::Store`] when the store lookup fails
    /// - [`TableError::CacheWrite`] when populating the cache fails
    pub async fn get_item<T>(
        &self,
        input: &GetItemInput,
        ttl: Option<Duration>,
    ) -> Result<T, TableError>
    where
        T: Serialize + DeserializeOwned + Sync,
    {
        let key = build_key(&self.key_schema, &input.key)?;
        let cache_key = self.cache_key(&key);
        let projected = input.projection_expression.is_some();

        if !projected {
            if let Some(record) = self.retrieve_from_cache(&cache_key).await {
                return Ok(record);
            }
        }

        let item = self
            .store
            .get(&self.table_name, input)
            .await?
            .ok_or_else(|| TableError::NotFound {
                table: self.table_name.clone(),
                key: self.key_label(&cache_key).to_string(),
            })?;

        let record: T = serde_json::from_value(Value::Object(item))
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        if let Some(ttl) = effective_ttl(ttl).filter(|_| !projected) {
            self.set_in_cache(&cache_key, &record, Some(ttl)).await?;
        }

        Ok(record)
    }

    /// Writes one serialized record under `cache_key`.
    ///
    /// A `None` (or zero) TTL falls back to the configured default TTL.
    pub async fn set_in_cache<T>(
        &self,
        cache_key: &str,
        record: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized,
    {
        let Some(cache) = &self.cache else {
            return Ok(());
        };

        let bytes = serialize_record(record)?;
        let ttl = effective_ttl(ttl).unwrap_or(self.default_ttl);

        match cache.set(cache_key, &bytes, Some(ttl)).await {
            Ok(()) => {
                self.stats.record_write();
                tracing::debug!(
                    table = %self.table_name,
                    cache_key,
                    ttl_secs = ttl.as_secs(),
                    "Cached record"
                );
                Ok(())
            }
            Err(err) => {
                self.stats.record_write_error();
                tracing::warn!(
                    table = %self.table_name,
                    cache_key,
                    error = %err,
                    "Failed to cache record"
                );
                Err(err)
            }
        }
    }

    /// Writes every entry of `items` concurrently.
    ///
    /// Every entry is attempted even when some fail; failures are reported
    /// together afterwards.
    pub async fn set_items_in_cache<T>(
        &self,
        items: &HashMap<String, &T>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>
    where
        T: Serialize + Sync,
    {
        if self.cache.is_none() || items.is_empty() {
            return Ok(());
        }

        let writes = items.iter().map(|(cache_key, record)| async move {
            self.set_in_cache(cache_key, *record, ttl)
                .await
                .map_err(|err| format!("{cache_key}: {err}"))
        });

        let failures: Vec<String> = join_all(writes)
            .await
            .into_iter()
            .filter_map(|result| result.err())
            .collect();

        if failures.is_empty() {
            tracing::debug!(
                table = %self.table_name,
                count = items.len(),
                "Cached records"
            );
            Ok(())
        } else {
            Err(CacheError::OperationFailed(format!(
                "{} of {} cache writes failed: {}",
                failures.len(),
                items.len(),
                failures.join("; ")
            )))
        }
    }

    /// Removes the cached copy of `key` in `table_name`.
    ///
    /// Returns whether an entry existed.
    pub async fn remove_item_from_cache(
        &self,
        table_name: &str,
        key: &PrimaryKey,
    ) -> Result<bool, CacheError> {
        let Some(cache) = &self.cache else {
            return Ok(false);
        };

        let cache_key = build_cache_key(&self.prefix, table_name, key);
        match cache.delete(&cache_key).await {
            Ok(existed) => {
                self.stats.record_removal();
                tracing::debug!(table = %table_name, cache_key, existed, "Removed cached record");
                Ok(existed)
            }
            Err(err) => {
                self.stats.record_write_error();
                tracing::warn!(
                    table = %table_name,
                    cache_key,
                    error = %err,
                    "Failed to remove cached record"
                );
                Err(err)
            }
        }
    }

    /// Reads and decodes a cached record. Never fails: errors and
    /// undecodable payloads are logged and reported as a miss.
    pub async fn retrieve_from_cache<T>(&self, cache_key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let Some(cache) = &self.cache else {
            self.stats.record_miss();
            return None;
        };

        match cache.get(cache_key).await {
            Ok(Some(bytes)) => match deserialize_record(&bytes) {
                Ok(record) => {
                    self.stats.record_hit();
                    tracing::trace!(table = %self.table_name, cache_key, "Cache hit");
                    Some(record)
                }
                Err(err) => {
                    self.stats.record_read_error();
                    tracing::warn!(
                        table = %self.table_name,
                        cache_key,
                        error = %err,
                        "Cached record could not be decoded"
                    );
                    None
                }
            },
            Ok(None) => {
                self.stats.record_miss();
                tracing::trace!(table = %self.table_name, cache_key, "Cache miss");
                None
            }
            Err(err) => {
                self.stats.record_read_error();
                tracing::warn!(
                    table = %self.table_name,
                    cache_key,
                    error = %err,
                    "Cache read failed"
                );
                None
            }
        }
    }

    fn key_label<'a>(&self, cache_key: &'a str) -> &'a str {
        cache_key
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix(self.table_name.as_str()))
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(cache_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use serde::Deserialize;
    use serde_json::json;

    use tablecache_core::storage::Item;

    use crate::mocks::{RecordingCache, RecordingStore};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: String,
        total: i64,
    }

    fn order(id: &str, total: i64) -> Order {
        Order {
            id: id.to_string(),
            total,
        }
    }

    fn item(value: Value) -> Item {
        value.as_object().cloned().unwrap()
    }

    fn key_input(id: &str) -> GetItemInput {
        GetItemInput::new(item(json!({ "id": id })))
    }

    fn setup() -> (
        Arc<RecordingStore>,
        Arc<RecordingCache>,
        CacheThroughStore<RecordingStore, RecordingCache>,
    ) {
        let store = Arc::new(RecordingStore::new());
        let cache = Arc::new(RecordingCache::new());
        let cached = CacheThroughStore::new(
            Arc::clone(&store),
            Some(Arc::clone(&cache)),
            "orders",
            KeySchema::partition("id"),
        );
        (store, cache, cached)
    }

    #[tokio::test]
    async fn test_get_item_cache_hit_skips_store() {
        let (store, cache, cached) = setup();
        cache
            .seed("sup:orders:id-o1", br#"{"id":"o1","total":10}"#)
            .await;

        let result: Order = cached.get_item(&key_input("o1"), None).await.unwrap();

        assert_eq!(result, order("o1", 10));
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 0);
        assert!(cache.sets().await.is_empty());
        assert_eq!(cached.stats().snapshot().hits, 1);
    }

    #[tokio::test]
    async fn test_get_item_miss_with_ttl_populates_cache() {
        let (store, cache, cached) = setup();
        store.respond_to_get(item(json!({"id": "o1", "total": 10}))).await;

        let result: Order = cached
            .get_item(&key_input("o1"), Some(Duration::from_secs(30)))
            .await
            .unwrap();

        assert_eq!(result, order("o1", 10));
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 1);
        let sets = cache.sets().await;
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].0, "sup:orders:id-o1");
        assert_eq!(sets[0].1, br#"{"id":"o1","total":10}"#.to_vec());
        assert_eq!(sets[0].2, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_get_item_with_projection_bypasses_cache() {
        let (store, cache, cached) = setup();
        cache
            .seed("sup:orders:id-o1", br#"{"id":"o1","total":10}"#)
            .await;
        store.respond_to_get(item(json!({"id": "o1"}))).await;

        let input = key_input("o1").with_projection("id");
        let projected: Value = cached
            .get_item(&input, Some(Duration::from_secs(30)))
            .await
            .unwrap();

        assert_eq!(projected, json!({"id": "o1"}));
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get_calls(), 0);
        assert!(cache.sets().await.is_empty());

        let full: Order = cached.get_item(&key_input("o1"), None).await.unwrap();
        assert_eq!(full, order("o1", 10));
    }

    #[tokio::test]
    async fn test_get_item_miss_without_ttl_does_not_populate() {
        let (store, cache, cached) = setup();
        store.respond_to_get(item(json!({"id": "o1", "total": 10}))).await;

        let _: Order = cached.get_item(&key_input("o1"), None).await.unwrap();
        let _: Order = cached
            .get_item(&key_input("o1"), Some(Duration::ZERO))
            .await
            .unwrap();

        assert!(cache.sets().await.is_empty());
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get_calls(), 2);
    }

    #[tokio::test]
    async fn test_get_item_not_found_anywhere() {
        let (_store, cache, cached) = setup();

        let result: Result<Order, _> = cached
            .get_item(&key_input("missing"), Some(Duration::from_secs(30)))
            .await;

        assert_eq!(
            result,
            Err(TableError::NotFound {
                table: "orders".to_string(),
                key: "id-missing".to_string(),
            })
        );
        assert!(cache.sets().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_item_cache_read_error_is_a_miss() {
        let (store, cache, cached) = setup();
        cache.fail_reads();
        store.respond_to_get(item(json!({"id": "o1", "total": 10}))).await;

        let result: Order = cached.get_item(&key_input("o1"), None).await.unwrap();

        assert_eq!(result, order("o1", 10));
        let stats = cached.stats().snapshot();
        assert_eq!(stats.read_errors, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_get_item_corrupt_cache_entry_falls_back_to_store() {
        let (store, cache, cached) = setup();
        cache.seed("sup:orders:id-o1", b"not json").await;
        store.respond_to_get(item(json!({"id": "o1", "total": 10}))).await;

        let result: Order = cached.get_item(&key_input("o1"), None).await.unwrap();

        assert_eq!(result, order("o1", 10));
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_item_population_failure_surfaces() {
        let (store, cache, cached) = setup();
        cache.fail_writes();
        store.respond_to_get(item(json!({"id": "o1", "total": 10}))).await;

        let result: Result<Order, _> = cached
            .get_item(&key_input("o1"), Some(Duration::from_secs(30)))
            .await;

        assert!(result.unwrap_err().is_cache_failure());
        assert_eq!(cached.stats().snapshot().write_errors, 1);
    }

    #[tokio::test]
    async fn test_get_item_store_error_propagates() {
        let (store, cache, cached) = setup();
        store
            .fail_with(StoreError::Throttled("slow down".to_string()))
            .await;

        let result: Result<Order, _> = cached.get_item(&key_input("o1"), None).await;

        assert_eq!(
            result,
            Err(TableError::Store(StoreError::Throttled(
                "slow down".to_string()
            )))
        );
        assert!(cache.sets().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_item_key_missing_from_input() {
        let (store, _cache, cached) = setup();

        let result: Result<Order, _> = cached
            .get_item(&GetItemInput::new(item(json!({"sku": "x"}))), None)
            .await;

        assert!(matches!(result, Err(TableError::Key(_))));
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_set_in_cache_uses_default_ttl() {
        let (_store, cache, cached) = setup();
        let cached = cached.with_default_ttl(Duration::from_secs(60));

        cached
            .set_in_cache("sup:orders:id-o1", &order("o1", 10), None)
            .await
            .unwrap();

        assert_eq!(cache.sets().await[0].2, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_set_items_in_cache_writes_every_entry() {
        let (_store, cache, cached) = setup();
        let records = [order("o1", 1), order("o2", 2)];
        let items: HashMap<String, &Order> = HashMap::from([
            ("sup:orders:id-o1".to_string(), &records[0]),
            ("sup:orders:id-o2".to_string(), &records[1]),
        ]);

        cached
            .set_items_in_cache(&items, Some(Duration::from_secs(30)))
            .await
            .unwrap();

        assert_eq!(cache.sets().await.len(), 2);
        assert_eq!(
            cache.stored("sup:orders:id-o2").await,
            Some(br#"{"id":"o2","total":2}"#.to_vec())
        );
    }

    #[tokio::test]
    async fn test_set_items_in_cache_attempts_all_then_reports() {
        let (_store, cache, cached) = setup();
        cache.fail_writes_for("sup:orders:id-o1").await;
        let records = [order("o1", 1), order("o2", 2), order("o3", 3)];
        let items: HashMap<String, &Order> = records
            .iter()
            .map(|r| (format!("sup:orders:id-{}", r.id), r))
            .collect();

        let result = cached
            .set_items_in_cache(&items, Some(Duration::from_secs(30)))
            .await;

        match result {
            Err(CacheError::OperationFailed(message)) => {
                assert!(message.starts_with("1 of 3 cache writes failed"));
                assert!(message.contains("sup:orders:id-o1"));
            }
            other => panic!("expected aggregated failure, got {other:?}"),
        }
        assert_eq!(cache.sets().await.len(), 3);
        assert!(cache.stored("sup:orders:id-o3").await.is_some());
    }

    #[tokio::test]
    async fn test_remove_item_from_cache_reports_presence() {
        let (_store, cache, cached) = setup();
        cache.seed("sup:orders:id-o1", b"{}").await;
        let key = build_key(cached.key_schema(), &item(json!({"id": "o1"}))).unwrap();

        assert!(cached.remove_item_from_cache("orders", &key).await.unwrap());
        assert!(!cached.remove_item_from_cache("orders", &key).await.unwrap());
        assert_eq!(cached.stats().snapshot().removals, 2);
    }

    #[tokio::test]
    async fn test_remove_item_from_cache_error_surfaces() {
        let (_store, cache, cached) = setup();
        cache.fail_deletes();
        let key = build_key(cached.key_schema(), &item(json!({"id": "o1"}))).unwrap();

        let result = cached.remove_item_from_cache("orders", &key).await;

        assert!(matches!(result, Err(CacheError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_unbound_cache_is_inert() {
        let store = Arc::new(RecordingStore::new());
        store.respond_to_get(item(json!({"id": "o1", "total": 10}))).await;
        let cached: CacheThroughStore<RecordingStore, RecordingCache> = CacheThroughStore::new(
            Arc::clone(&store),
            None,
            "orders",
            KeySchema::partition("id"),
        );
        let key = build_key(cached.key_schema(), &item(json!({"id": "o1"}))).unwrap();

        let result: Order = cached
            .get_item(&key_input("o1"), Some(Duration::from_secs(30)))
            .await
            .unwrap();

        assert_eq!(result, order("o1", 10));
        assert_eq!(
            cached.retrieve_from_cache::<Order>("sup:orders:id-o1").await,
            None
        );
        assert!(cached
            .set_in_cache("sup:orders:id-o1", &result, None)
            .await
            .is_ok());
        assert!(!cached.remove_item_from_cache("orders", &key).await.unwrap());
        assert_eq!(cached.stats().snapshot().misses, 2);
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let (store, cache, cached) = setup();
        let cached = cached.with_prefix("app:");
        store.respond_to_get(item(json!({"id": "o1", "total": 10}))).await;

        let _: Order = cached
            .get_item(&key_input("o1"), Some(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(cache.sets().await[0].0, "app:orders:id-o1");
    }
}
