//! Identity types for document nodes and scopes

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a node owned by the external document.
///
/// Ids are opaque strings. Inside expressions they appear in transclusion
/// tokens (`#[id]`), so created ids only use characters accepted there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if every character is legal inside a `#[...]` token.
    pub fn is_transcludable(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/'))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Generate a fresh node id (UUIDv7, timestamp-sortable).
pub fn new_node_id() -> NodeId {
    NodeId(Uuid::now_v7().to_string())
}

/// Generational handle to a scope stored in the engine's arena.
///
/// A slot can be reused after its scope is freed; the generation makes
/// handles to the freed scope detectably stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId {
    pub index: u32,
    pub generation: u32,
}

impl ScopeId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_id_is_transcludable() {
        let id = new_node_id();
        assert!(id.is_transcludable());
        assert_ne!(id, new_node_id());
    }

    #[test]
    fn test_node_id_rejects_illegal_chars() {
        assert!(NodeId::from("a/b-c_1").is_transcludable());
        assert!(!NodeId::from("a b").is_transcludable());
        assert!(!NodeId::from("").is_transcludable());
        assert!(!NodeId::from("x]").is_transcludable());
    }

    #[test]
    fn test_scope_id_display() {
        assert_eq!(ScopeId::new(3, 7).to_string(), "3v7");
    }
}
