//! In-process cache backend.
//!
//! A `HashMap` behind an `RwLock`, with hit/miss/write counters. It never
//! evicts; use it for tests, single-process tools, or as a reference for
//! writing a networked backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use cachet_core::{CacheError, CacheKey, CachetResult};

use super::traits::{CacheBackend, CacheStats};

fn poisoned<T>(_: PoisonError<T>) -> CacheError {
    CacheError::Backend {
        reason: "cache lock poisoned".to_string(),
    }
}

/// In-memory cache backend.
#[derive(Debug, Default)]
pub struct InMemoryCacheBackend {
    entries: RwLock<HashMap<CacheKey, Vec<u8>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryCacheBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes without touching the write counter.
    pub fn insert_raw(&self, key: CacheKey, value: Vec<u8>) -> CachetResult<()> {
        self.entries.write().map_err(poisoned)?.insert(key, value);
        Ok(())
    }

    /// Read raw bytes without touching the hit/miss counters.
    pub fn peek(&self, key: &CacheKey) -> CachetResult<Option<Vec<u8>>> {
        Ok(self.entries.read().map_err(poisoned)?.get(key).cloned())
    }

    pub fn contains(&self, key: &CacheKey) -> CachetResult<bool> {
        Ok(self.entries.read().map_err(poisoned)?.contains_key(key))
    }

    pub fn remove(&self, key: &CacheKey) -> CachetResult<Option<Vec<u8>>> {
        Ok(self.entries.write().map_err(poisoned)?.remove(key))
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) -> CachetResult<()> {
        self.entries.write().map_err(poisoned)?.clear();
        Ok(())
    }

    pub fn len(&self) -> CachetResult<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> CachetResult<bool> {
        Ok(self.len()? == 0)
    }

    fn record_reads(&self, hits: u64, misses: u64) {
        self.hits.fetch_add(hits, Ordering::Relaxed);
        self.misses.fetch_add(misses, Ordering::Relaxed);
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &CacheKey) -> CachetResult<Option<Vec<u8>>> {
        let value = self.entries.read().map_err(poisoned)?.get(key).cloned();
        match value {
            Some(_) => self.record_reads(1, 0),
            None => self.record_reads(0, 1),
        }
        Ok(value)
    }

    async fn get_many(&self, keys: &[CacheKey]) -> CachetResult<HashMap<CacheKey, Vec<u8>>> {
        let entries = self.entries.read().map_err(poisoned)?;
        let found: HashMap<CacheKey, Vec<u8>> = keys
            .iter()
            .filter_map(|key| entries.get(key).map(|value| (key.clone(), value.clone())))
            .collect();
        drop(entries);

        let hits = keys.iter().filter(|key| found.contains_key(*key)).count() as u64;
        self.record_reads(hits, keys.len() as u64 - hits);
        Ok(found)
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>) -> CachetResult<()> {
        self.entries
            .write()
            .map_err(poisoned)?
            .insert(key.clone(), value);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn set_many(&self, entries: HashMap<CacheKey, Vec<u8>>) -> CachetResult<()> {
        let count = entries.len() as u64;
        self.entries.write().map_err(poisoned)?.extend(entries);
        self.writes.fetch_add(count, Ordering::Relaxed);
        Ok(())
    }

    async fn stats(&self) -> CachetResult<CacheStats> {
        let entries = self.entries.read().map_err(poisoned)?;
        let memory_bytes = entries
            .iter()
            .map(|(key, value)| (key.as_str().len() + value.len()) as u64)
            .sum();
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            entry_count: entries.len() as u64,
            memory_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let backend = InMemoryCacheBackend::new();
        let key = CacheKey::new("user:1");

        backend.set(&key, b"alice".to_vec()).await.unwrap();
        assert_eq!(backend.get(&key).await.unwrap(), Some(b"alice".to_vec()));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let backend = InMemoryCacheBackend::new();
        assert_eq!(backend.get(&CacheKey::new("nope")).await.unwrap(), None);

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn test_get_many_omits_missing_keys() {
        let backend = InMemoryCacheBackend::new();
        backend.set(&CacheKey::new("a"), b"1".to_vec()).await.unwrap();
        backend.set(&CacheKey::new("c"), b"3".to_vec()).await.unwrap();

        let found = backend
            .get_many(&[CacheKey::new("a"), CacheKey::new("b"), CacheKey::new("c")])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(!found.contains_key(&CacheKey::new("b")));

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_set_many_and_stats() {
        let backend = InMemoryCacheBackend::new();
        let mut batch = HashMap::new();
        batch.insert(CacheKey::new("x"), b"10".to_vec());
        batch.insert(CacheKey::new("y"), b"20".to_vec());
        backend.set_many(batch).await.unwrap();

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.writes, 2);
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.memory_bytes, 6);
        assert_eq!(backend.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_raw_helpers_skip_counters() {
        let backend = InMemoryCacheBackend::new();
        let key = CacheKey::new("k");
        backend.insert_raw(key.clone(), b"v".to_vec()).unwrap();
        assert_eq!(backend.peek(&key).unwrap(), Some(b"v".to_vec()));
        assert!(backend.contains(&key).unwrap());

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.writes, 0);
        assert_eq!(stats.hits + stats.misses, 0);

        backend.clear().unwrap();
        assert!(backend.is_empty().unwrap());
    }
}
