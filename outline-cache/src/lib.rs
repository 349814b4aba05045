//! Outline Cache - Bounded Provider Cache
//!
//! Caches external provider responses by request signature so repeated
//! evaluation of the same formula does not hit the network again. Every
//! cache is bounded by entry count (LRU) and entry age (TTL).

pub mod cache;

pub use cache::{
    CacheBackend, CacheConfig, CacheKey, CacheRead, CacheStats, Freshness, MemoryCacheBackend,
    ReadThroughCache,
};

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
