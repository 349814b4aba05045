//! Read-through cache for provider calls.
//!
//! Reads consult the backend first and fall back to the fetch closure on a
//! miss. Only successful fetches are stored, so a failed provider call is
//! retried the next time the same request is made.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use outline_core::{CacheSettings, OutlineResult};

use super::freshness::{CacheRead, Freshness};
use super::key::CacheKey;
use super::memory::MemoryCacheBackend;
use super::traits::{CacheBackend, CacheStats};

/// Configuration for a provider cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries before LRU eviction.
    pub max_entries: usize,
    /// Age after which an entry is no longer served.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            ttl: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            max_entries: settings.max_entries,
            ttl: settings.ttl(),
        }
    }
}

/// Read-through cache over a [`CacheBackend`].
///
/// # Example
///
/// ```ignore
/// let cache = ReadThroughCache::in_memory(CacheConfig::new());
/// let key = CacheKey::from_signature("routing", &(from, to));
/// let route = cache
///     .get_or_fetch(key, || async { provider.route(from, to).await })
///     .await?
///     .into_value();
/// ```
pub struct ReadThroughCache<V, B = MemoryCacheBackend<V>> {
    backend: Arc<B>,
    _value: PhantomData<fn() -> V>,
}

impl<V> ReadThroughCache<V, MemoryCacheBackend<V>>
where
    V: Clone + Send + Sync + 'static,
{
    /// Cache backed by a bounded in-memory store.
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(Arc::new(MemoryCacheBackend::new(config)))
    }

    pub fn with_defaults() -> Self {
        Self::in_memory(CacheConfig::default())
    }
}

impl<V, B> ReadThroughCache<V, B>
where
    V: Clone + Send + Sync + 'static,
    B: CacheBackend<V>,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            _value: PhantomData,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Read with the default freshness (anything within TTL).
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> OutlineResult<CacheRead<V>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = OutlineResult<V>> + Send,
    {
        self.get_with(key, Freshness::WithinTtl, fetch).await
    }

    /// Read with an explicit freshness requirement.
    ///
    /// # Arguments
    ///
    /// * `key` - Namespaced request key
    /// * `freshness` - How old a cached value may be
    /// * `fetch` - Called on a miss; its error is returned and not cached
    pub async fn get_with<F, Fut>(
        &self,
        key: CacheKey,
        freshness: Freshness,
        fetch: F,
    ) -> OutlineResult<CacheRead<V>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = OutlineResult<V>> + Send,
    {
        if freshness != Freshness::Bypass {
            if let Some((value, cached_at)) = self.backend.get(&key).await? {
                if freshness.accepts(cached_at) {
                    tracing::trace!(key = %key, "Cache hit");
                    return Ok(CacheRead::from_cache(value, cached_at));
                }
            }
        }

        tracing::debug!(key = %key, "Cache miss, fetching");
        let value = fetch().await?;
        self.backend.put(key, value.clone(), Utc::now()).await?;
        Ok(CacheRead::from_fetch(value))
    }

    /// Store a value directly, e.g. to warm the cache.
    pub async fn put(&self, key: CacheKey, value: V) -> OutlineResult<()> {
        self.backend.put(key, value, Utc::now()).await
    }

    pub async fn invalidate(&self, key: &CacheKey) -> OutlineResult<bool> {
        self.backend.delete(key).await
    }

    pub async fn invalidate_all(&self) -> OutlineResult<u64> {
        self.backend.clear().await
    }

    pub async fn stats(&self) -> OutlineResult<CacheStats> {
        self.backend.stats().await
    }
}

impl<V, B> Clone for ReadThroughCache<V, B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            _value: PhantomData,
        }
    }
}

impl<V, B> std::fmt::Debug for ReadThroughCache<V, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache").finish_non_exhaustive()
    }
}
