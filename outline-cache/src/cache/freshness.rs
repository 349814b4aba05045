//! Freshness contracts for cache reads.
//!
//! Callers state how old a cached provider response may be, and every read
//! comes back as a [`CacheRead`] that says whether it was served from the
//! cache and how old it is.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Staleness tolerance for one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Serve any entry the backend still holds; its TTL is the only limit.
    #[default]
    WithinTtl,

    /// Serve cached data only if it is younger than `max_age`.
    MaxAge {
        max_age: Duration,
    },

    /// Skip the cache for this read and refresh the entry.
    Bypass,
}

impl Freshness {
    pub fn max_age(max_age: Duration) -> Self {
        Self::MaxAge { max_age }
    }

    /// Whether an entry cached at `cached_at` may be served.
    pub fn accepts(&self, cached_at: DateTime<Utc>) -> bool {
        match self {
            Self::WithinTtl => true,
            Self::MaxAge { max_age } => age_since(cached_at) <= *max_age,
            Self::Bypass => false,
        }
    }
}

/// A value read through the cache, with its provenance.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    cached_at: DateTime<Utc>,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// A value served from the cache.
    pub fn from_cache(value: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            value,
            cached_at,
            was_cache_hit: true,
        }
    }

    /// A value just fetched from the provider.
    pub fn from_fetch(value: T) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    /// Time since the value was fetched from the provider.
    pub fn age(&self) -> Duration {
        age_since(self.cached_at)
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            cached_at: self.cached_at,
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

fn age_since(cached_at: DateTime<Utc>) -> Duration {
    (Utc::now() - cached_at).to_std().unwrap_or(Duration::ZERO)
}
