//! Namespaced cache keys.
//!
//! A key is a provider namespace plus the SHA-256 digest of a canonical
//! request signature. The private inner struct means a key can only be
//! built from a namespace, so two providers never share entries even when
//! their request signatures coincide.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Separator byte between the namespace and the signature.
const SEPARATOR: u8 = 0xFF;

/// A cache key scoped to one provider namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    inner: CacheKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct CacheKeyInner {
    namespace: String,
    digest: String,
}

impl CacheKey {
    /// Build a key from a namespace and the parts of a request.
    ///
    /// # Arguments
    ///
    /// * `namespace` - Provider name, e.g. `"routing"`
    /// * `parts` - Request components in a fixed order
    ///
    /// # Example
    ///
    /// ```ignore
    /// let key = CacheKey::from_parts("weather", &["2026-05-01", "52.52,13.40"]);
    /// ```
    pub fn from_parts(namespace: &str, parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        for part in parts {
            hasher.update([SEPARATOR]);
            hasher.update(part.as_bytes());
        }
        Self::finish(namespace, hasher)
    }

    /// Build a key from any serializable request signature.
    ///
    /// The signature is serialized to JSON first; map keys are sorted by
    /// `serde_json`, so equal signatures always produce equal keys.
    pub fn from_signature<S: Serialize + ?Sized>(namespace: &str, signature: &S) -> Self {
        let canonical = serde_json::to_value(signature)
            .map(|v| v.to_string())
            .unwrap_or_else(|e| {
                tracing::warn!(namespace, error = %e, "Unserializable cache signature");
                String::new()
            });
        Self::from_parts(namespace, &[&canonical])
    }

    fn finish(namespace: &str, hasher: Sha256) -> Self {
        Self {
            inner: CacheKeyInner {
                namespace: namespace.to_string(),
                digest: hex::encode(hasher.finalize()),
            },
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Hex-encoded SHA-256 digest of namespace and signature.
    pub fn digest(&self) -> &str {
        &self.inner.digest
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.inner.namespace, &self.inner.digest[..12])
    }
}
