//! In-memory LRU key-value store.
//!
//! Holds configuration documents and decoded raster windows for the
//! lifetime of the process. Entries are evicted least-recently-used first
//! once the entry capacity is reached.

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::StorageResult;
use crate::kv::{KeyValueStore, Namespace};

/// Statistics for the memory store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStoreStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub bytes_stored: u64,
}

impl MemoryStoreStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// In-memory LRU cache keyed by `(namespace, key)`.
#[derive(Clone)]
pub struct MemoryStore {
    cache: Arc<RwLock<LruCache<(Namespace, String), Bytes>>>,
    stats: Arc<RwLock<MemoryStoreStats>>,
    capacity: usize,
}

impl MemoryStore {
    /// Create a store holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let cache_size = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Arc::new(RwLock::new(LruCache::new(cache_size))),
            stats: Arc::new(RwLock::new(MemoryStoreStats::default())),
            capacity,
        }
    }

    /// Get current cache statistics.
    pub async fn stats(&self) -> MemoryStoreStats {
        let cache = self.cache.read().await;
        let mut stats = self.stats.write().await;
        stats.entries = cache.len();
        stats.bytes_stored = cache.iter().map(|(_, v)| v.len() as u64).sum();
        stats.clone()
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
        *self.stats.write().await = MemoryStoreStats::default();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, namespace: Namespace, key: &str) -> StorageResult<Option<Bytes>> {
        let mut cache = self.cache.write().await;
        let found = cache.get(&(namespace, key.to_string())).cloned();

        let mut stats = self.stats.write().await;
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        Ok(found)
    }

    async fn put(&self, namespace: Namespace, key: &str, value: Bytes) -> StorageResult<()> {
        let mut cache = self.cache.write().await;
        cache.put((namespace, key.to_string()), value);
        Ok(())
    }
}
