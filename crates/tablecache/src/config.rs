use std::{env, time::Duration};

use tablecache_core::cache::CACHE_KEY_PREFIX;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Default cache TTL in seconds (default: 300)
    pub cache_ttl_seconds: u64,
    /// Maximum number of in-process cache entries (default: 10,000)
    pub cache_max_entries: usize,
    /// Prefix for every cache key (default: "sup:")
    pub cache_key_prefix: String,
    /// Redis connection URL (default: "redis://localhost:6379")
    /// Note: Only used when the `redis` feature is enabled.
    pub redis_url: String,
    /// Table used when none is given explicitly (default: "tablecache")
    pub table_name: String,
    /// AWS region; the SDK default chain applies when unset.
    pub aws_region: Option<String>,
    /// Endpoint override for DynamoDB, e.g. DynamoDB Local.
    pub dynamodb_endpoint_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CACHE_TTL_SECONDS` - Default cache TTL in seconds (default: 300)
    /// - `CACHE_MAX_ENTRIES` - Maximum in-process cache entries (default: 10,000)
    /// - `CACHE_KEY_PREFIX` - Cache key prefix (default: "sup:")
    /// - `REDIS_URL` - Redis connection URL (default: "redis://localhost:6379")
    /// - `DYNAMODB_TABLE_NAME` - Default table name (default: "tablecache")
    /// - `AWS_REGION` - AWS region (optional)
    /// - `DYNAMODB_ENDPOINT_URL` - DynamoDB endpoint override (optional)
    pub fn from_env() -> Self {
        Self {
            cache_ttl_seconds: env::var("CACHE_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            cache_max_entries: env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            cache_key_prefix: env::var("CACHE_KEY_PREFIX")
                .unwrap_or_else(|_| CACHE_KEY_PREFIX.to_string()),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            table_name: env::var("DYNAMODB_TABLE_NAME")
                .unwrap_or_else(|_| "tablecache".to_string()),
            aws_region: env::var("AWS_REGION").ok().filter(|v| !v.is_empty()),
            dynamodb_endpoint_url: env::var("DYNAMODB_ENDPOINT_URL")
                .ok()
                .filter(|v| !v.is_empty()),
        }
    }

    /// Get the default cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
