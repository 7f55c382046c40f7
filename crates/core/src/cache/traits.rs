use std::time::Duration;

use async_trait::async_trait;

use super::Result;

/// Trait for the generic key-value cache store.
///
/// Expiry is entirely the store's concern: values written with a TTL must
/// stop being returned once it elapses.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets a value from the cache by key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value in the cache with an optional TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Deletes a value from the cache by key.
    ///
    /// Returns `true` if a live entry existed and was removed.
    async fn delete(&self, key: &str) -> Result<bool>;
}
