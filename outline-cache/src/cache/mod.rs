//! Bounded provider cache with explicit freshness.
//!
//! Provider calls (routing, places, weather, flights) are slow and often
//! rate limited, and the same request is made by every scope that
//! evaluates the same formula. This module caches their responses by
//! request signature.
//!
//! # Design
//!
//! - Keys are [`CacheKey`]s: a provider namespace plus a SHA-256 digest of
//!   the request, so providers never see each other's entries.
//! - Every backend is bounded. [`MemoryCacheBackend`] evicts the least
//!   recently used entry past `max_entries` and drops entries older than
//!   `ttl`.
//! - Reads return [`CacheRead<T>`], which says whether the value came from
//!   the cache and how old it is. Callers can tighten the age limit per
//!   read with [`Freshness`].
//!
//! # Example
//!
//! ```ignore
//! let cache = ReadThroughCache::in_memory(CacheConfig::from(&settings));
//! let read = cache
//!     .get_with(key, Freshness::max_age(Duration::from_secs(600)), || fetch())
//!     .await?;
//! if read.was_cache_hit() {
//!     tracing::debug!(age_ms = read.age().as_millis() as u64, "Served from cache");
//! }
//! ```

pub mod freshness;
pub mod key;
pub mod memory;
pub mod read_through;
pub mod traits;

pub use freshness::{CacheRead, Freshness};
pub use key::CacheKey;
pub use memory::MemoryCacheBackend;
pub use read_through::{CacheConfig, ReadThroughCache};
pub use traits::{CacheBackend, CacheStats};
