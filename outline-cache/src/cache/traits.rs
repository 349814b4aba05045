//! Cache backend trait and statistics.

use super::key::CacheKey;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outline_core::OutlineResult;
use serde::{Deserialize, Serialize};

/// Cache backend trait for pluggable cache implementations.
///
/// Implementations must be thread-safe: one backend is shared by every
/// scope that calls the same provider.
///
/// # Expiry
///
/// A backend decides when an entry is too old to serve. `get` never
/// returns an expired entry; it removes it and counts an expiration.
#[async_trait]
pub trait CacheBackend<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Get a value and when it was cached, or None if absent or expired.
    async fn get(&self, key: &CacheKey) -> OutlineResult<Option<(V, DateTime<Utc>)>>;

    /// Put a value into the cache, evicting as needed to stay bounded.
    async fn put(&self, key: CacheKey, value: V, cached_at: DateTime<Utc>) -> OutlineResult<()>;

    /// Delete a value. Returns whether an entry was present.
    async fn delete(&self, key: &CacheKey) -> OutlineResult<bool>;

    /// Drop every entry. Returns the number removed.
    async fn clear(&self) -> OutlineResult<u64>;

    /// Get cache statistics.
    async fn stats(&self) -> OutlineResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, including expired entries.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
    /// Number of entries dropped because their TTL elapsed.
    pub expirations: u64,
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
