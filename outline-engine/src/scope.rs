//! Scope records and the public scope handle

use crate::notify::{HandlerId, UpdateHandler, ScopeUpdate, UpdateKind};
use crate::tree::ScopeTree;
use indexmap::IndexMap;
use outline_core::{classify_text, NodeId, ScopeId, Value, ValueType};
use outline_dsl::{Bullet, ExprKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

// ============================================================================
// EVALUATION STATE
// ============================================================================

/// Evaluation state of one scope. Transitions only move forward:
/// `Idle → Pending → Resolved`. Re-evaluation replaces one resolved value
/// with another.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalState {
    Idle,
    Pending,
    /// One value per bullet part, in source order.
    Resolved(Arc<[Value]>),
}

impl EvalState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, EvalState::Resolved(_))
    }

    pub fn values(&self) -> Option<Arc<[Value]>> {
        match self {
            EvalState::Resolved(values) => Some(Arc::clone(values)),
            _ => None,
        }
    }
}

/// Side-channel result a function publishes on a scope, separate from the
/// scope's own value.
///
/// A scope holds at most one result per `(publisher, name)`; a later run of
/// the same publisher replaces its earlier result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationResult {
    pub name: String,
    pub data: Value,
    /// Scope whose evaluation published the result; None when published
    /// outside any evaluation.
    pub publisher: Option<ScopeId>,
    /// Evaluation epoch of the publisher at the time of publishing.
    pub epoch: u64,
}

/// Scope and epoch of the evaluation running on the current task.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Publisher {
    pub scope: ScopeId,
    pub epoch: u64,
}

tokio::task_local! {
    pub(crate) static PUBLISHER: Publisher;
}

// ============================================================================
// SCOPE RECORD
// ============================================================================

/// Arena entry backing one scope.
pub(crate) struct ScopeRecord {
    pub node_id: NodeId,
    /// Non-owning back link.
    pub parent: Option<ScopeId>,
    pub bullet: Arc<Bullet>,
    /// Owned, 1:1 with the document node's children.
    pub children: Vec<ScopeId>,
    /// Owned, one per distinct `#[id]` in the bullet.
    pub transcluded: IndexMap<NodeId, ScopeId>,
    /// Index into `children`; first child with a given key wins.
    pub named_props: IndexMap<String, ScopeId>,
    pub state: watch::Sender<EvalState>,
    pub computation_results: Vec<ComputationResult>,
    pub disabled: bool,
    /// Bumped whenever in-flight evaluation must be discarded.
    pub epoch: u64,
    /// Stub for a transclusion cycle or a missing node.
    pub placeholder: bool,
    /// This scope is a transclusion occurrence, not the node's natural place.
    pub transclusion: bool,
}

impl ScopeRecord {
    pub fn new(node_id: NodeId, parent: Option<ScopeId>, bullet: Bullet, transclusion: bool) -> Self {
        let (state, _) = watch::channel(EvalState::Idle);
        Self {
            node_id,
            parent,
            bullet: Arc::new(bullet),
            children: Vec::new(),
            transcluded: IndexMap::new(),
            named_props: IndexMap::new(),
            state,
            computation_results: Vec::new(),
            disabled: false,
            epoch: 0,
            placeholder: false,
            transclusion,
        }
    }

    pub fn placeholder(node_id: NodeId, parent: Option<ScopeId>, transclusion: bool) -> Self {
        let mut record = Self::new(
            node_id,
            parent,
            Bullet::literal(""),
            transclusion,
        );
        record.placeholder = true;
        record
    }
}

// ============================================================================
// SCOPE HANDLE
// ============================================================================

/// Cheap, cloneable reference to a scope in a [`ScopeTree`].
///
/// A handle stays usable after its scope is freed by a rebuild; every
/// accessor then reports "no value" instead of failing.
#[derive(Clone)]
pub struct ScopeHandle {
    tree: ScopeTree,
    id: ScopeId,
}

impl ScopeHandle {
    pub(crate) fn new(tree: ScopeTree, id: ScopeId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn tree(&self) -> &ScopeTree {
        &self.tree
    }

    fn with_record<R>(&self, f: impl FnOnce(&ScopeRecord) -> R) -> Option<R> {
        let arena = self.tree.inner.read_arena();
        arena.get(self.id).map(f)
    }

    fn handle(&self, id: ScopeId) -> ScopeHandle {
        ScopeHandle::new(self.tree.clone(), id)
    }

    /// False once the scope was freed by a rebuild.
    pub fn is_valid(&self) -> bool {
        self.tree.inner.read_arena().is_valid(self.id)
    }

    // ========================================================================
    // Structure
    // ========================================================================

    pub fn node_id(&self) -> Option<NodeId> {
        self.with_record(|r| r.node_id.clone())
    }

    pub fn bullet(&self) -> Option<Arc<Bullet>> {
        self.with_record(|r| Arc::clone(&r.bullet))
    }

    /// The bullet's `key:` if this scope is a named property.
    pub fn key(&self) -> Option<String> {
        self.with_record(|r| r.bullet.key_name().map(str::to_string))
            .flatten()
    }

    pub fn parent(&self) -> Option<ScopeHandle> {
        self.with_record(|r| r.parent)
            .flatten()
            .map(|id| self.handle(id))
    }

    pub fn children(&self) -> Vec<ScopeHandle> {
        self.with_record(|r| r.children.clone())
            .unwrap_or_default()
            .into_iter()
            .map(|id| self.handle(id))
            .collect()
    }

    pub fn transcluded_scopes(&self) -> Vec<(NodeId, ScopeHandle)> {
        self.with_record(|r| {
            r.transcluded
                .iter()
                .map(|(node, id)| (node.clone(), *id))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
        .into_iter()
        .map(|(node, id)| (node, self.handle(id)))
        .collect()
    }

    /// Scope created for `#[id]` inside this scope's bullet.
    pub fn transcluded_scope(&self, id: &NodeId) -> Option<ScopeHandle> {
        self.with_record(|r| r.transcluded.get(id).copied())
            .flatten()
            .map(|sid| self.handle(sid))
    }

    pub fn named_props(&self) -> Vec<(String, ScopeHandle)> {
        self.with_record(|r| {
            r.named_props
                .iter()
                .map(|(k, id)| (k.clone(), *id))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
        .into_iter()
        .map(|(k, id)| (k, self.handle(id)))
        .collect()
    }

    /// Position among the parent's children. None for the root and for
    /// transclusion occurrences.
    pub fn index_in_parent(&self) -> Option<usize> {
        let arena = self.tree.inner.read_arena();
        let record = arena.get(self.id)?;
        let parent = arena.get(record.parent?)?;
        parent.children.iter().position(|id| *id == self.id)
    }

    pub fn is_disabled(&self) -> bool {
        self.with_record(|r| r.disabled).unwrap_or(true)
    }

    pub fn is_placeholder(&self) -> bool {
        self.with_record(|r| r.placeholder).unwrap_or(false)
    }

    pub fn is_transclusion(&self) -> bool {
        self.with_record(|r| r.transclusion).unwrap_or(false)
    }

    // ========================================================================
    // Values
    // ========================================================================

    pub fn state(&self) -> EvalState {
        self.with_record(|r| r.state.borrow().clone())
            .unwrap_or(EvalState::Idle)
    }

    pub fn is_resolved(&self) -> bool {
        self.with_record(|r| r.state.borrow().is_resolved())
            .unwrap_or(false)
    }

    /// Per-part values, or None while not resolved.
    pub fn values(&self) -> Option<Arc<[Value]>> {
        self.with_record(|r| r.state.borrow().values()).flatten()
    }

    /// Value of one bullet part; `Undefined` until resolved.
    pub fn value_of(&self, index: usize) -> Value {
        self.values()
            .and_then(|values| values.get(index).cloned())
            .unwrap_or_default()
    }

    /// Per-part values, starting evaluation if needed and waiting up to the
    /// configured resolution timeout.
    pub async fn values_async(&self) -> Option<Arc<[Value]>> {
        if let Some(values) = self.values() {
            return Some(values);
        }
        if self.is_disabled() {
            return None;
        }

        let inner = &self.tree.inner;
        if inner.ensure_dispatcher().is_ok() {
            inner.start_eval(self.id, false);
        }

        let mut rx = self.with_record(|r| r.state.subscribe())?;
        let timeout = inner.config.evaluation.resolution_timeout();
        let values = match tokio::time::timeout(timeout, rx.wait_for(EvalState::is_resolved)).await {
            Ok(Ok(state)) => state.values(),
            Ok(Err(_)) => None,
            Err(_) => {
                tracing::debug!(scope = %self.id, "Timed out waiting for scope to resolve");
                None
            }
        };
        values
    }

    pub async fn value_of_async(&self, index: usize) -> Value {
        self.values_async()
            .await
            .and_then(|values| values.get(index).cloned())
            .unwrap_or_default()
    }

    /// The scope's value: its single part, `Undefined` for no parts, or the
    /// concatenated display text of several parts. Transcluded parts are
    /// replaced by the transcluded scope's value.
    pub fn value(&self) -> Value {
        match self.values() {
            Some(values) => combine_parts(&values, |id| {
                self.handle(id)
                    .values()
                    .map(|v| combine_parts(&v, |_| Value::Undefined))
                    .unwrap_or_default()
            }),
            None => Value::Undefined,
        }
    }

    pub async fn value_async(&self) -> Value {
        let Some(values) = self.values_async().await else {
            return Value::Undefined;
        };
        for value in values.iter() {
            if let Value::Scope(id) = value {
                self.handle(*id).values_async().await;
            }
        }
        self.value()
    }

    /// Follow a `Value::Scope` to that scope's value; other values are
    /// returned unchanged.
    pub async fn resolve(&self, value: &Value) -> Value {
        match value {
            Value::Scope(id) => self.handle(*id).value_async().await,
            other => other.clone(),
        }
    }

    /// Most specific typed value of the scope: the first non-text typed
    /// part, else the first text part. Unresolved scopes fall back to
    /// classifying their literal parts.
    pub fn typed_value(&self) -> Option<Value> {
        let candidates: Vec<Value> = match self.values() {
            Some(values) => values
                .iter()
                .map(|v| match v {
                    Value::Scope(id) => self.handle(*id).value(),
                    other => other.clone(),
                })
                .collect(),
            None => self
                .bullet()?
                .parts
                .iter()
                .filter_map(|part| match &part.kind {
                    ExprKind::StringLiteral(text) => Some(classify_text(text)),
                    _ => None,
                })
                .collect(),
        };

        let typed = |v: &Value| match v {
            Value::Text(s) => !s.trim().is_empty(),
            other => other.value_type().is_some(),
        };
        candidates
            .iter()
            .find(|v| typed(v) && v.value_type() != Some(ValueType::Text))
            .or_else(|| candidates.iter().find(|v| typed(v)))
            .cloned()
    }

    pub fn value_type(&self) -> Option<ValueType> {
        self.typed_value().and_then(|v| v.value_type())
    }

    // ========================================================================
    // Properties and lookup
    // ========================================================================

    /// Child scope holding the named property `name`.
    pub fn property_scope(&self, name: &str) -> Option<ScopeHandle> {
        self.with_record(|r| r.named_props.get(name).copied())
            .flatten()
            .map(|id| self.handle(id))
    }

    /// Value of the named property child; `Undefined` if absent or not yet
    /// resolved.
    pub fn get_property(&self, name: &str) -> Value {
        self.property_scope(name)
            .map(|scope| scope.value())
            .unwrap_or_default()
    }

    pub async fn get_property_async(&self, name: &str) -> Value {
        match self.property_scope(name) {
            Some(scope) => scope.value_async().await,
            None => Value::Undefined,
        }
    }

    /// Find the named property `name`, searching from the parent upward.
    /// A scope never finds its own key; the search continues past it.
    pub fn lookup(&self, name: &str) -> Option<ScopeHandle> {
        let arena = self.tree.inner.read_arena();
        let mut current = arena.get(self.id)?.parent;
        while let Some(id) = current {
            let record = arena.get(id)?;
            match record.named_props.get(name) {
                Some(found) if *found != self.id => return Some(self.handle(*found)),
                _ => {}
            }
            current = record.parent;
        }
        None
    }

    /// True if `id` is this scope's node or one of its ancestors' nodes.
    pub fn is_in_scope(&self, id: &NodeId) -> bool {
        let arena = self.tree.inner.read_arena();
        let mut current = Some(self.id);
        while let Some(sid) = current {
            let Some(record) = arena.get(sid) else {
                return false;
            };
            if &record.node_id == id {
                return true;
            }
            current = record.parent;
        }
        false
    }

    // ========================================================================
    // Computation results
    // ========================================================================

    /// Publish a side-channel result and notify update handlers.
    ///
    /// Called from inside an evaluation, the result is tagged with the
    /// evaluating scope and replaces that scope's earlier result of the same
    /// name. Results from a stale or disabled evaluation are dropped, and a
    /// disabled scope accepts no results.
    pub fn add_computation_result(&self, name: impl Into<String>, data: Value) {
        let publisher = PUBLISHER.try_with(|p| *p).ok();
        let stored = {
            let mut arena = self.tree.inner.write_arena();
            let live = publisher.map_or(true, |p| {
                arena
                    .get(p.scope)
                    .is_some_and(|r| r.epoch == p.epoch && !r.disabled)
            });
            match arena.get_mut(self.id) {
                Some(record) if live && !record.disabled => {
                    let result = ComputationResult {
                        name: name.into(),
                        data,
                        publisher: publisher.map(|p| p.scope),
                        epoch: publisher.map_or(0, |p| p.epoch),
                    };
                    let previous = record
                        .computation_results
                        .iter_mut()
                        .find(|r| r.publisher == result.publisher && r.name == result.name);
                    match previous {
                        Some(previous) => *previous = result,
                        None => record.computation_results.push(result),
                    }
                    true
                }
                _ => false,
            }
        };
        if stored {
            self.tree.inner.post(self.id, UpdateKind::ComputationResult);
        } else {
            tracing::trace!(scope = %self.id, "Dropping computation result");
        }
    }

    pub fn computation_results(&self) -> Vec<ComputationResult> {
        self.with_record(|r| r.computation_results.clone())
            .unwrap_or_default()
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Pre-order walk over this scope, its children and (unless skipped)
    /// its transcluded scopes. Each call receives the context returned for
    /// its parent.
    pub fn traverse_scope<C, F>(&self, mut f: F, context: C, include_transclusions: bool)
    where
        C: Clone,
        F: FnMut(&ScopeHandle, &C) -> C,
    {
        self.traverse_inner(&mut f, &context, include_transclusions);
    }

    fn traverse_inner<C, F>(&self, f: &mut F, context: &C, include_transclusions: bool)
    where
        C: Clone,
        F: FnMut(&ScopeHandle, &C) -> C,
    {
        let next = f(self, context);

        for child in self.children() {
            child.traverse_inner(f, &next, include_transclusions);
        }
        if include_transclusions {
            for (_, scope) in self.transcluded_scopes() {
                scope.traverse_inner(f, &next, include_transclusions);
            }
        }
    }

    /// Collect `extract`'s results over the whole subtree, transclusions
    /// included.
    pub fn extract_data_in_scope<T, F>(&self, mut extract: F) -> Vec<T>
    where
        F: FnMut(&ScopeHandle) -> Option<T>,
    {
        let mut data = Vec::new();
        self.traverse_scope(
            |scope, _: &()| {
                if let Some(item) = extract(scope) {
                    data.push(item);
                }
            },
            (),
            true,
        );
        data
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Called when this scope or any descendant resolves.
    pub fn register_update_handler<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&ScopeUpdate) + Send + Sync + 'static,
    {
        let handler: UpdateHandler = Arc::new(handler);
        self.tree.inner.handlers.register(self.id, handler)
    }

    pub fn unregister_update_handler(&self, id: HandlerId) -> bool {
        self.tree.inner.handlers.unregister(id)
    }
}

impl PartialEq for ScopeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.tree.same_tree(&other.tree)
    }
}

impl fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHandle")
            .field("id", &self.id)
            .field("node", &self.node_id())
            .finish()
    }
}

/// Merge per-part values into one value.
fn combine_parts(values: &[Value], deref: impl Fn(ScopeId) -> Value) -> Value {
    let resolve = |v: &Value| match v {
        Value::Scope(id) => deref(*id),
        other => other.clone(),
    };
    match values {
        [] => Value::Undefined,
        [single] => resolve(single),
        parts => Value::Text(
            parts
                .iter()
                .map(|v| resolve(v).display_text())
                .collect::<String>(),
        ),
    }
}
