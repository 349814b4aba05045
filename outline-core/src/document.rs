//! Document collaborator contract and an in-memory implementation
//!
//! The engine never owns document nodes. It reads them through [`Document`]
//! to build scopes and writes through it when formula generalization
//! inserts new nodes. Change notification is the owner's job: after a
//! mutation the owner rebuilds the affected scopes.

use crate::{new_node_id, DocumentError, NodeId, OutlineError, OutlineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A document node as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub value: String,
    pub children: Vec<NodeId>,
}

/// Read/write access to the externally owned node tree.
pub trait Document: Send + Sync {
    /// Id of the document root.
    fn root_id(&self) -> NodeId;

    /// Snapshot of a node, or None if the id is unknown.
    fn get_node(&self, id: &NodeId) -> Option<Node>;

    /// Parent of a node; None for the root and for detached nodes.
    fn parent_of(&self, id: &NodeId) -> Option<NodeId>;

    /// Create a detached node holding `value` and return its id.
    fn create_node(&mut self, value: &str) -> NodeId;

    /// Insert `child` under `parent` at `index` (clamped to the child count).
    /// A child that already has a parent is moved.
    fn insert_child(&mut self, parent: &NodeId, index: usize, child: &NodeId)
        -> OutlineResult<()>;

    /// Detach `child` from `parent`.
    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> OutlineResult<()>;

    /// Replace a node's text.
    fn set_value(&mut self, id: &NodeId, value: &str) -> OutlineResult<()>;

    /// Monotonic counter bumped on every mutation.
    fn version(&self) -> u64;
}

// ============================================================================
// IN-MEMORY DOCUMENT
// ============================================================================

/// Simple hash-map backed document.
#[derive(Debug, Clone)]
pub struct InMemoryDocument {
    root: NodeId,
    nodes: HashMap<NodeId, Node>,
    parents: HashMap<NodeId, NodeId>,
    version: u64,
}

impl InMemoryDocument {
    /// Create a document with an empty root node named `root`.
    pub fn new() -> Self {
        Self::with_root(NodeId::from("root"), "")
    }

    pub fn with_root(id: NodeId, value: &str) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                value: value.to_string(),
                children: Vec::new(),
            },
        );
        Self {
            root: id,
            nodes,
            parents: HashMap::new(),
            version: 0,
        }
    }

    /// Parse an indented outline.
    ///
    /// Every line is `- text` or `- [id] text`, indented by two spaces per
    /// level. Top-level lines become children of the root. Nodes without an
    /// explicit id get a generated one.
    ///
    /// ```text
    /// - [a] position: 1,1
    /// - [b] position: 2,2
    ///   - [c] {Distance(from: #[a], to: #[b])}
    /// ```
    pub fn from_outline(source: &str) -> OutlineResult<Self> {
        let mut doc = Self::new();
        // Most recent node at each depth; index 0 is the root.
        let mut stack: Vec<NodeId> = vec![doc.root.clone()];

        for (line_no, raw) in source.lines().enumerate() {
            let line_no = line_no + 1;
            if raw.trim().is_empty() {
                continue;
            }
            let indent = raw.len() - raw.trim_start_matches(' ').len();
            if indent % 2 != 0 {
                return Err(outline_error(line_no, "indentation must be a multiple of two"));
            }
            let depth = indent / 2 + 1;
            if depth > stack.len() {
                return Err(outline_error(line_no, "indentation skips a level"));
            }

            let body = raw.trim_start_matches(' ');
            let body = body
                .strip_prefix("- ")
                .or_else(|| body.strip_prefix('-'))
                .ok_or_else(|| outline_error(line_no, "expected '- ' bullet marker"))?;

            let (id, text) = split_explicit_id(body);
            let id = match id {
                Some(id) => {
                    if doc.nodes.contains_key(&id) {
                        return Err(outline_error(line_no, "duplicate node id"));
                    }
                    id
                }
                None => new_node_id(),
            };

            stack.truncate(depth);
            let parent = stack[depth - 1].clone();
            doc.add_child_with_id(&parent, id.clone(), text)?;
            stack.push(id);
        }

        doc.version = 0;
        Ok(doc)
    }

    /// Append a new child with a generated id.
    pub fn add_child(&mut self, parent: &NodeId, value: &str) -> OutlineResult<NodeId> {
        let id = new_node_id();
        self.add_child_with_id(parent, id.clone(), value)?;
        Ok(id)
    }

    /// Append a new child with a caller-chosen id.
    pub fn add_child_with_id(
        &mut self,
        parent: &NodeId,
        id: NodeId,
        value: &str,
    ) -> OutlineResult<()> {
        if self.nodes.contains_key(&id) {
            return Err(OutlineError::Document(DocumentError::InvalidStructure {
                id,
                reason: "node id already exists".to_string(),
            }));
        }
        let len = self.node(parent)?.children.len();
        self.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                value: value.to_string(),
                children: Vec::new(),
            },
        );
        self.insert_child(parent, len, &id)
    }

    /// Number of nodes including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Render the tree back to outline form (explicit ids included).
    pub fn to_outline(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.nodes.get(&self.root) {
            for child in &root.children {
                self.write_outline(child, 0, &mut out);
            }
        }
        out
    }

    fn write_outline(&self, id: &NodeId, depth: usize, out: &mut String) {
        if let Some(node) = self.nodes.get(id) {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&format!("- [{}] {}\n", node.id, node.value));
            for child in &node.children {
                self.write_outline(child, depth + 1, out);
            }
        }
    }

    fn node(&self, id: &NodeId) -> OutlineResult<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| OutlineError::Document(DocumentError::NodeNotFound { id: id.clone() }))
    }

    fn node_mut(&mut self, id: &NodeId) -> OutlineResult<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| OutlineError::Document(DocumentError::NodeNotFound { id: id.clone() }))
    }

    fn is_ancestor_or_self(&self, candidate: &NodeId, of: &NodeId) -> bool {
        let mut current = Some(of.clone());
        while let Some(id) = current {
            if &id == candidate {
                return true;
            }
            current = self.parents.get(&id).cloned();
        }
        false
    }
}

impl Default for InMemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl Document for InMemoryDocument {
    fn root_id(&self) -> NodeId {
        self.root.clone()
    }

    fn get_node(&self, id: &NodeId) -> Option<Node> {
        self.nodes.get(id).cloned()
    }

    fn parent_of(&self, id: &NodeId) -> Option<NodeId> {
        self.parents.get(id).cloned()
    }

    fn create_node(&mut self, value: &str) -> NodeId {
        let id = new_node_id();
        self.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                value: value.to_string(),
                children: Vec::new(),
            },
        );
        self.version += 1;
        id
    }

    fn insert_child(
        &mut self,
        parent: &NodeId,
        index: usize,
        child: &NodeId,
    ) -> OutlineResult<()> {
        self.node(parent)?;
        self.node(child)?;
        if self.is_ancestor_or_self(child, parent) {
            return Err(OutlineError::Document(DocumentError::InvalidStructure {
                id: child.clone(),
                reason: format!("cannot insert under its own descendant {}", parent),
            }));
        }

        if let Some(old_parent) = self.parents.remove(child) {
            self.node_mut(&old_parent)?.children.retain(|c| c != child);
        }

        let node = self.node_mut(parent)?;
        let index = index.min(node.children.len());
        node.children.insert(index, child.clone());
        self.parents.insert(child.clone(), parent.clone());
        self.version += 1;
        Ok(())
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> OutlineResult<()> {
        let node = self.node_mut(parent)?;
        let before = node.children.len();
        node.children.retain(|c| c != child);
        if node.children.len() == before {
            return Err(OutlineError::Document(DocumentError::InvalidStructure {
                id: parent.clone(),
                reason: format!("{} is not a child", child),
            }));
        }
        self.parents.remove(child);
        self.version += 1;
        Ok(())
    }

    fn set_value(&mut self, id: &NodeId, value: &str) -> OutlineResult<()> {
        self.node_mut(id)?.value = value.to_string();
        self.version += 1;
        Ok(())
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn split_explicit_id(body: &str) -> (Option<NodeId>, &str) {
    if let Some(rest) = body.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            let id = &rest[..end];
            let text = rest[end + 1..].strip_prefix(' ').unwrap_or(&rest[end + 1..]);
            if !id.is_empty() && NodeId::from(id).is_transcludable() {
                return (Some(NodeId::from(id)), text);
            }
        }
    }
    (None, body)
}

fn outline_error(line: usize, reason: &str) -> OutlineError {
    OutlineError::Document(DocumentError::InvalidOutline {
        line,
        reason: reason.to_string(),
    })
}

// =============================================================================
// TESTS
// =============================================================================
