//! Recording test doubles for the cache and the table store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tablecache_core::cache::{Cache, CacheError, Result as CacheResult};
use tablecache_core::storage::{
    Condition, GetItemInput, Item, ItemsPage, QueryInput, Result, ScanInput, StoreError,
    TableStore, UpdateRequest,
};

/// Ordered log of calls shared between mocks, for asserting call order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

fn log(log: &Option<CallLog>, entry: String) {
    if let Some(log) = log {
        log.lock().unwrap().push(entry);
    }
}

/// A cache that records every write and removal.
#[derive(Default)]
pub struct RecordingCache {
    store: RwLock<HashMap<String, Vec<u8>>>,
    sets: RwLock<Vec<(String, Vec<u8>, Option<Duration>)>>,
    deletes: RwLock<Vec<String>>,
    get_calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_deletes: AtomicBool,
    failing_keys: RwLock<HashSet<String>>,
    fail_all_writes: AtomicBool,
    log: Option<CallLog>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    /// Seeds an entry without recording it as a write.
    pub async fn seed(&self, key: &str, value: &[u8]) {
        self.store
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
    }

    pub async fn stored(&self, key: &str) -> Option<Vec<u8>> {
        self.store.read().await.get(key).cloned()
    }

    pub async fn sets(&self) -> Vec<(String, Vec<u8>, Option<Duration>)> {
        self.sets.read().await.clone()
    }

    pub async fn deletes(&self) -> Vec<String> {
        self.deletes.read().await.clone()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_all_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub async fn fail_writes_for(&self, key: &str) {
        self.failing_keys.write().await.insert(key.to_string());
    }
}

#[async_trait]
impl Cache for RecordingCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionFailed("cache unreachable".to_string()));
        }
        Ok(self.store.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        log(&self.log, format!("cache.set {key}"));
        self.sets
            .write()
            .await
            .push((key.to_string(), value.to_vec(), ttl));

        if self.fail_all_writes.load(Ordering::SeqCst)
            || self.failing_keys.read().await.contains(key)
        {
            return Err(CacheError::OperationFailed(format!("write to {key} refused")));
        }

        self.store
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        log(&self.log, format!("cache.delete {key}"));
        self.deletes.write().await.push(key.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionFailed("cache unreachable".to_string()));
        }
        Ok(self.store.write().await.remove(key).is_some())
    }
}

/// A table store returning canned responses and counting calls.
#[derive(Default)]
pub struct RecordingStore {
    get_response: RwLock<Option<Item>>,
    page: RwLock<ItemsPage>,
    update_response: RwLock<Option<Item>>,
    failure: RwLock<Option<StoreError>>,
    puts: RwLock<Vec<(String, Item, Option<Condition>)>>,
    updates: RwLock<Vec<(String, UpdateRequest)>>,
    deletes: RwLock<Vec<(String, Item)>>,
    pub get_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub scan_calls: AtomicUsize,
    log: Option<CallLog>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    pub async fn respond_to_get(&self, item: Item) {
        *self.get_response.write().await = Some(item);
    }

    pub async fn respond_with_page(&self, items: Vec<Item>) {
        *self.page.write().await = ItemsPage {
            count: items.len(),
            scanned_count: items.len(),
            items,
            last_evaluated_key: None,
        };
    }

    pub async fn respond_to_update(&self, item: Item) {
        *self.update_response.write().await = Some(item);
    }

    /// Makes every subsequent call fail with `error`.
    pub async fn fail_with(&self, error: StoreError) {
        *self.failure.write().await = Some(error);
    }

    pub async fn puts(&self) -> Vec<(String, Item, Option<Condition>)> {
        self.puts.read().await.clone()
    }

    pub async fn updates(&self) -> Vec<(String, UpdateRequest)> {
        self.updates.read().await.clone()
    }

    pub async fn deletes(&self) -> Vec<(String, Item)> {
        self.deletes.read().await.clone()
    }

    async fn check(&self) -> Result<()> {
        match self.failure.read().await.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TableStore for RecordingStore {
    async fn get(&self, _table_name: &str, _input: &GetItemInput) -> Result<Option<Item>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check().await?;
        Ok(self.get_response.read().await.clone())
    }

    async fn query(&self, _table_name: &str, _input: &QueryInput) -> Result<ItemsPage> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.check().await?;
        Ok(self.page.read().await.clone())
    }

    async fn scan(&self, _table_name: &str, _input: &ScanInput) -> Result<ItemsPage> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        self.check().await?;
        Ok(self.page.read().await.clone())
    }

    async fn put(
        &self,
        table_name: &str,
        item: Item,
        condition: Option<&Condition>,
    ) -> Result<()> {
        self.check().await?;
        log(&self.log, format!("store.put {table_name}"));
        self.puts
            .write()
            .await
            .push((table_name.to_string(), item, condition.cloned()));
        Ok(())
    }

    async fn update(&self, table_name: &str, request: &UpdateRequest) -> Result<Option<Item>> {
        self.check().await?;
        log(&self.log, format!("store.update {table_name}"));
        self.updates
            .write()
            .await
            .push((table_name.to_string(), request.clone()));
        Ok(self.update_response.read().await.clone())
    }

    async fn delete(&self, table_name: &str, key: &Item) -> Result<()> {
        self.check().await?;
        log(&self.log, format!("store.delete {table_name}"));
        self.deletes
            .write()
            .await
            .push((table_name.to_string(), key.clone()));
        Ok(())
    }
}
