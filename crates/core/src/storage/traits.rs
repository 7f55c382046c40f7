use async_trait::async_trait;

use super::{Condition, GetItemInput, Item, ItemsPage, QueryInput, Result, ScanInput, UpdateRequest};

/// The backing table store: the source of truth for every record.
///
/// Implementations own transport, retries and instrumentation. They report
/// conditional-write rejections as [`super::StoreError::ConditionalCheckFailed`].
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Point lookup by primary key.
    async fn get(&self, table_name: &str, input: &GetItemInput) -> Result<Option<Item>>;

    /// Range query over one partition (or index partition).
    async fn query(&self, table_name: &str, input: &QueryInput) -> Result<ItemsPage>;

    /// Full or filtered scan.
    async fn scan(&self, table_name: &str, input: &ScanInput) -> Result<ItemsPage>;

    /// Inserts or overwrites a record, optionally guarded by a condition.
    async fn put(&self, table_name: &str, item: Item, condition: Option<&Condition>)
        -> Result<()>;

    /// Applies a partial update and returns the record as it is after the update.
    async fn update(&self, table_name: &str, request: &UpdateRequest) -> Result<Option<Item>>;

    /// Removes a record unconditionally.
    async fn delete(&self, table_name: &str, key: &Item) -> Result<()>;
}
