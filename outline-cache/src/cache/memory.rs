//! In-memory cache backend, bounded by entry count and age.
//!
//! Entries expire `ttl` after insertion and the least recently used entry
//! is evicted when a put would exceed `max_entries`. Expiry is measured on
//! the tokio clock, so paused-time tests can advance past a TTL.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outline_core::OutlineResult;
use tokio::time::Instant;

use super::key::CacheKey;
use super::read_through::CacheConfig;
use super::traits::{CacheBackend, CacheStats};

struct Entry<V> {
    value: V,
    cached_at: DateTime<Utc>,
    inserted: Instant,
    last_used: u64,
}

struct Inner<V> {
    entries: HashMap<CacheKey, Entry<V>>,
    /// `last_used` of every entry, oldest first. Kept in step with `entries`.
    recency: BTreeMap<u64, CacheKey>,
    /// Monotonic use counter for LRU ordering.
    clock: u64,
    stats: CacheStats,
}

impl<V> Inner<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn insert(&mut self, key: CacheKey, entry: Entry<V>) {
        self.recency.insert(entry.last_used, key.clone());
        if let Some(old) = self.entries.insert(key, entry) {
            self.recency.remove(&old.last_used);
        }
    }

    fn remove(&mut self, key: &CacheKey) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.last_used);
        Some(entry)
    }

    /// Mark `key` as used now.
    fn touch(&mut self, key: &CacheKey) -> Option<&Entry<V>> {
        let now = self.tick();
        let entry = self.entries.get_mut(key)?;
        let previous = std::mem::replace(&mut entry.last_used, now);
        self.recency.remove(&previous);
        self.recency.insert(now, key.clone());
        self.entries.get(key)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn evict_lru(&mut self) -> Option<CacheKey> {
        let (_, oldest) = self.recency.pop_first()?;
        self.entries.remove(&oldest);
        self.stats.evictions += 1;
        Some(oldest)
    }
}

/// LRU + TTL cache held in process memory.
///
/// # Example
///
/// ```ignore
/// let backend = MemoryCacheBackend::new(CacheConfig::new().with_max_entries(256));
/// backend.put(key.clone(), route, Utc::now()).await?;
/// let cached = backend.get(&key).await?;
/// ```
pub struct MemoryCacheBackend<V> {
    config: CacheConfig,
    inner: Mutex<Inner<V>>,
}

impl<V> MemoryCacheBackend<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Current number of entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> u64 {
        let ttl = self.config.ttl;
        let mut inner = self.lock();
        let expired: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.inserted.elapsed() >= ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        let removed = expired.len() as u64;
        inner.stats.expirations += removed;
        removed
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl<V> Default for MemoryCacheBackend<V> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl<V> CacheBackend<V> for MemoryCacheBackend<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &CacheKey) -> OutlineResult<Option<(V, DateTime<Utc>)>> {
        let ttl = self.config.ttl;
        let mut inner = self.lock();

        let expired = match inner.entries.get(key) {
            None => {
                inner.stats.misses += 1;
                return Ok(None);
            }
            Some(entry) => entry.inserted.elapsed() >= ttl,
        };
        if expired {
            inner.remove(key);
            inner.stats.expirations += 1;
            inner.stats.misses += 1;
            tracing::trace!(key = %key, "Cache entry expired");
            return Ok(None);
        }

        inner.stats.hits += 1;
        Ok(inner
            .touch(key)
            .map(|entry| (entry.value.clone(), entry.cached_at)))
    }

    async fn put(&self, key: CacheKey, value: V, cached_at: DateTime<Utc>) -> OutlineResult<()> {
        if self.config.max_entries == 0 {
            return Ok(());
        }
        let mut inner = self.lock();
        let now = inner.tick();

        if !inner.entries.contains_key(&key) {
            while inner.entries.len() >= self.config.max_entries {
                match inner.evict_lru() {
                    Some(evicted) => tracing::trace!(key = %evicted, "Evicted cache entry"),
                    None => break,
                }
            }
        }
        inner.insert(
            key,
            Entry {
                value,
                cached_at,
                inserted: Instant::now(),
                last_used: now,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> OutlineResult<bool> {
        Ok(self.lock().remove(key).is_some())
    }

    async fn clear(&self) -> OutlineResult<u64> {
        let mut inner = self.lock();
        let removed = inner.entries.len() as u64;
        inner.clear();
        Ok(removed)
    }

    async fn stats(&self) -> OutlineResult<CacheStats> {
        let inner = self.lock();
        Ok(CacheStats {
            entry_count: inner.entries.len() as u64,
            ..inner.stats.clone()
        })
    }
}

impl<V> std::fmt::Debug for MemoryCacheBackend<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCacheBackend")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}
