//! Cache backend trait and usage statistics.
//!
//! The backend is an opaque key-value service. Values are raw bytes; typed
//! encoding lives in [`super::entry`].

use std::collections::HashMap;

use async_trait::async_trait;
use cachet_core::{CacheKey, CachetResult};

/// Cache backend trait for pluggable cache implementations.
///
/// This trait abstracts over different cache backends (e.g., Redis,
/// memcached, in-memory). Implementations should be thread-safe and support
/// concurrent access. Expiry and eviction are the backend's business.
///
/// Bulk operations carry no ordering or atomicity guarantee across keys.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a value from the cache, or `None` if the key is not cached.
    async fn get(&self, key: &CacheKey) -> CachetResult<Option<Vec<u8>>>;

    /// Get many values at once.
    ///
    /// Keys that are not cached are simply missing from the returned map.
    async fn get_many(&self, keys: &[CacheKey]) -> CachetResult<HashMap<CacheKey, Vec<u8>>>;

    /// Put a value into the cache, replacing any previous value.
    async fn set(&self, key: &CacheKey, value: Vec<u8>) -> CachetResult<()>;

    /// Put many values at once.
    async fn set_many(&self, entries: HashMap<CacheKey, Vec<u8>>) -> CachetResult<()>;

    /// Get cache statistics.
    async fn stats(&self) -> CachetResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of keys found on read.
    pub hits: u64,
    /// Number of keys not found on read.
    pub misses: u64,
    /// Number of keys written.
    pub writes: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Approximate memory usage in bytes.
    pub memory_bytes: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
