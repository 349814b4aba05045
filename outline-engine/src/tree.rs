//! Scope tree construction, evaluation scheduling and rebuilds

use crate::arena::Arena;
use crate::eval;
use crate::notify::{self, HandlerTable, ScopeEvent, UpdateKind};
use crate::registry::FunctionRegistry;
use crate::scope::{EvalState, Publisher, ScopeHandle, ScopeRecord, PUBLISHER};
use outline_core::{Document, EngineConfig, EvalError, NodeId, OutlineResult, ScopeId, Value};
use outline_dsl::parse_bullet_or_literal;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;

// ============================================================================
// SCOPE TREE
// ============================================================================

/// Evaluation-time mirror of a document: one scope per node occurrence,
/// transclusion occurrences included.
///
/// The tree is owned by whoever built it for one document version. It is
/// cheap to clone (all clones share the same arena).
#[derive(Clone)]
pub struct ScopeTree {
    pub(crate) inner: Arc<TreeInner>,
}

pub(crate) struct TreeInner {
    arena: RwLock<Arena<ScopeRecord>>,
    root: RwLock<ScopeId>,
    registry: Arc<FunctionRegistry>,
    pub(crate) config: EngineConfig,
    events: mpsc::UnboundedSender<ScopeEvent>,
    pending_events: Mutex<Option<mpsc::UnboundedReceiver<ScopeEvent>>>,
    pub(crate) handlers: HandlerTable,
}

impl ScopeTree {
    /// Build the scope tree for `document`.
    ///
    /// Construction is synchronous and does not evaluate anything. Call
    /// [`ScopeTree::evaluate_all`] from inside a tokio runtime to start
    /// evaluation.
    pub fn build(
        document: &dyn Document,
        registry: Arc<FunctionRegistry>,
        config: EngineConfig,
    ) -> Self {
        let mut arena = Arena::new();
        let mut path = Vec::new();
        let root = build_scope(
            &mut arena,
            document,
            &document.root_id(),
            None,
            false,
            &mut path,
        );
        tracing::debug!(scopes = arena.len(), "Built scope tree");

        let (events, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(TreeInner {
                arena: RwLock::new(arena),
                root: RwLock::new(root),
                registry,
                config,
                events,
                pending_events: Mutex::new(Some(rx)),
                handlers: HandlerTable::default(),
            }),
        }
    }

    /// Build with a registry holding only `Get` and default configuration.
    pub fn with_defaults(document: &dyn Document) -> Self {
        Self::build(
            document,
            Arc::new(FunctionRegistry::new()),
            EngineConfig::default(),
        )
    }

    pub fn root(&self) -> ScopeHandle {
        let root = *self.inner.root.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Scope root lock was poisoned, recovering");
            poisoned.into_inner()
        });
        ScopeHandle::new(self.clone(), root)
    }

    /// Handle for a live scope id.
    pub fn handle(&self, id: ScopeId) -> Option<ScopeHandle> {
        if self.inner.read_arena().is_valid(id) {
            Some(ScopeHandle::new(self.clone(), id))
        } else {
            None
        }
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Number of live scopes.
    pub fn len(&self) -> usize {
        self.inner.read_arena().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read_arena().is_empty()
    }

    pub(crate) fn same_tree(&self, other: &ScopeTree) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Every live scope for `node`, natural occurrence first.
    pub fn scopes_for_node(&self, node: &NodeId) -> Vec<ScopeHandle> {
        let mut found: Vec<(bool, ScopeId)> = self
            .inner
            .read_arena()
            .iter()
            .filter(|(_, record)| &record.node_id == node)
            .map(|(id, record)| (record.transclusion, id))
            .collect();
        found.sort_by_key(|(transclusion, _)| *transclusion);
        found
            .into_iter()
            .map(|(_, id)| ScopeHandle::new(self.clone(), id))
            .collect()
    }

    /// The natural (non-transclusion) scope of `node`.
    pub fn scope_for_node(&self, node: &NodeId) -> Option<ScopeHandle> {
        self.scopes_for_node(node)
            .into_iter()
            .find(|scope| !scope.is_transclusion())
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Start evaluating `scope` and, without waiting, every child and
    /// transcluded scope below it.
    ///
    /// # Returns
    /// `EvalError::NoRuntime` when called outside a tokio runtime.
    pub fn evaluate(&self, scope: &ScopeHandle) -> OutlineResult<()> {
        self.inner.ensure_dispatcher()?;

        let mut stack = vec![scope.id()];
        while let Some(id) = stack.pop() {
            self.inner.start_eval(id, false);
            let arena = self.inner.read_arena();
            if let Some(record) = arena.get(id) {
                stack.extend(record.children.iter().copied());
                stack.extend(record.transcluded.values().copied());
            }
        }
        Ok(())
    }

    pub fn evaluate_all(&self) -> OutlineResult<()> {
        self.evaluate(&self.root())
    }

    /// Restart evaluation of one scope. In-flight results from earlier runs
    /// are discarded when they complete.
    pub fn reevaluate(&self, scope: &ScopeHandle) -> OutlineResult<()> {
        self.inner.ensure_dispatcher()?;
        if self.inner.start_eval(scope.id(), true) {
            Ok(())
        } else {
            Err(EvalError::ScopeNotFound {
                scope: scope.id().to_string(),
            }
            .into())
        }
    }

    /// Disable a scope and everything it owns. Disabled scopes never
    /// report updates and discard in-flight results.
    pub fn disable(&self, scope: &ScopeHandle) {
        let mut arena = self.inner.write_arena();
        for id in subtree_ids(&arena, scope.id()) {
            if let Some(record) = arena.get_mut(id) {
                record.disabled = true;
                record.epoch += 1;
            }
        }
    }

    /// Replace the subtree at `scope` with a fresh build from `document`.
    ///
    /// The old subtree is disabled and freed, so stale handles report no
    /// value. The new scope takes the old one's slot in its parent's child
    /// list (or transclusion map) and named properties are reindexed.
    ///
    /// Handlers registered on `scope` itself move to the new scope; handlers
    /// on its descendants are dropped with them.
    pub fn rebuild(&self, scope: &ScopeHandle, document: &dyn Document) -> OutlineResult<ScopeHandle> {
        let old = scope.id();
        let (new_id, freed) = {
            let mut arena = self.inner.write_arena();
            let record = arena.get(old).ok_or_else(|| EvalError::ScopeNotFound {
                scope: old.to_string(),
            })?;
            let node_id = record.node_id.clone();
            let parent = record.parent;
            let transclusion = record.transclusion;

            let mut path = ancestor_nodes(&arena, parent);
            let freed = subtree_ids(&arena, old);
            for id in &freed {
                if let Some(record) = arena.get_mut(*id) {
                    record.disabled = true;
                    record.epoch += 1;
                }
                arena.free(*id);
            }

            let new_id = build_scope(&mut arena, document, &node_id, parent, transclusion, &mut path);

            match parent {
                Some(parent_id) => splice(&mut arena, parent_id, old, new_id, &node_id),
                None => {
                    let mut root = self.inner.root.write().unwrap_or_else(|poisoned| {
                        tracing::warn!("Scope root lock was poisoned, recovering");
                        poisoned.into_inner()
                    });
                    *root = new_id;
                }
            }
            (new_id, freed)
        };

        self.inner.handlers.transfer(old, new_id);
        for id in freed {
            self.inner.handlers.remove_scope(id);
        }
        tracing::debug!(old = %old, new = %new_id, "Rebuilt scope subtree");
        Ok(ScopeHandle::new(self.clone(), new_id))
    }

    /// Wait until every live scope has resolved or timed out.
    pub async fn settle(&self) {
        loop {
            let pending: Vec<ScopeId> = self
                .inner
                .read_arena()
                .iter()
                .filter(|(_, r)| !r.disabled && !r.state.borrow().is_resolved())
                .map(|(id, _)| id)
                .collect();
            if pending.is_empty() {
                break;
            }
            let mut progressed = false;
            for id in pending {
                if let Some(scope) = self.handle(id) {
                    progressed |= scope.values_async().await.is_some();
                }
            }
            if !progressed {
                break;
            }
        }
        // Let the dispatcher drain queued notifications.
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }
}

impl std::fmt::Debug for ScopeTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeTree")
            .field("root", &self.root().id())
            .field("scopes", &self.len())
            .finish()
    }
}

// ============================================================================
// INNER STATE
// ============================================================================

impl TreeInner {
    pub(crate) fn read_arena(&self) -> RwLockReadGuard<'_, Arena<ScopeRecord>> {
        match self.arena.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Scope arena lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub(crate) fn write_arena(&self) -> RwLockWriteGuard<'_, Arena<ScopeRecord>> {
        match self.arena.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Scope arena lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Spawn the dispatcher on first use. Fails outside a tokio runtime.
    pub(crate) fn ensure_dispatcher(self: &Arc<Self>) -> OutlineResult<()> {
        tokio::runtime::Handle::try_current().map_err(|_| EvalError::NoRuntime)?;

        let rx = match self.pending_events.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(rx) = rx {
            notify::spawn_dispatcher(Arc::downgrade(self), rx);
        }
        Ok(())
    }

    /// Spawn the evaluation task for one scope.
    ///
    /// Without `force`, only idle scopes start. Returns false for freed or
    /// disabled scopes.
    pub(crate) fn start_eval(self: &Arc<Self>, id: ScopeId, force: bool) -> bool {
        let (epoch, bullet, placeholder) = {
            let mut arena = self.write_arena();
            let Some(record) = arena.get_mut(id) else {
                return false;
            };
            if record.disabled {
                return false;
            }
            let idle = matches!(*record.state.borrow(), EvalState::Idle);
            if !idle && !force {
                return true;
            }
            record.epoch += 1;
            if idle {
                record.state.send_replace(EvalState::Pending);
            }
            (record.epoch, Arc::clone(&record.bullet), record.placeholder)
        };

        let scope = ScopeHandle::new(ScopeTree { inner: Arc::clone(self) }, id);
        let publisher = Publisher { scope: id, epoch };
        tokio::spawn(PUBLISHER.scope(publisher, async move {
            let values = if placeholder {
                Vec::new()
            } else {
                eval::eval_bullet(&scope, &bullet).await
            };
            scope.tree().inner.complete(id, epoch, values);
        }));
        true
    }

    /// Store a finished evaluation unless it is stale, then post an event.
    fn complete(&self, id: ScopeId, epoch: u64, values: Vec<Value>) {
        let notify = {
            let arena = self.read_arena();
            let Some(record) = arena.get(id) else {
                tracing::trace!(scope = %id, "Discarding result for freed scope");
                return;
            };
            if record.epoch != epoch || record.disabled {
                tracing::trace!(scope = %id, epoch, "Discarding stale result");
                return;
            }
            record.state.send_replace(EvalState::Resolved(Arc::from(values)));
            true
        };
        if notify {
            self.post(id, UpdateKind::Resolved);
        }
    }

    pub(crate) fn post(&self, scope: ScopeId, kind: UpdateKind) {
        if self.events.send(ScopeEvent { scope, kind }).is_err() {
            tracing::trace!(scope = %scope, "Event channel closed");
        }
    }

    /// Scopes from `origin` to the root, cut at the first disabled one.
    pub(crate) fn enabled_ancestor_chain(&self, origin: ScopeId) -> Vec<ScopeId> {
        let arena = self.read_arena();
        let mut chain = Vec::new();
        let mut current = Some(origin);
        while let Some(id) = current {
            let Some(record) = arena.get(id) else {
                break;
            };
            if record.disabled {
                break;
            }
            chain.push(id);
            current = record.parent;
        }
        chain
    }
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

/// Recursively build the scope for `node_id`.
///
/// `path` holds the node ids currently being built. Meeting one of them
/// again means a transclusion cycle; the occurrence becomes a placeholder.
fn build_scope(
    arena: &mut Arena<ScopeRecord>,
    document: &dyn Document,
    node_id: &NodeId,
    parent: Option<ScopeId>,
    transclusion: bool,
    path: &mut Vec<NodeId>,
) -> ScopeId {
    if path.contains(node_id) {
        tracing::warn!(node = %node_id, "Transclusion cycle detected, using placeholder scope");
        return arena.alloc(ScopeRecord::placeholder(node_id.clone(), parent, transclusion));
    }
    let Some(node) = document.get_node(node_id) else {
        tracing::warn!(node = %node_id, "Referenced node not found, using placeholder scope");
        return arena.alloc(ScopeRecord::placeholder(node_id.clone(), parent, transclusion));
    };

    let bullet = parse_bullet_or_literal(&node.value);
    let referenced = bullet.referenced_ids();
    let id = arena.alloc(ScopeRecord::new(node_id.clone(), parent, bullet, transclusion));

    path.push(node_id.clone());
    let children: Vec<ScopeId> = node
        .children
        .iter()
        .map(|child| build_scope(arena, document, child, Some(id), false, path))
        .collect();
    let transcluded: Vec<(NodeId, ScopeId)> = referenced
        .into_iter()
        .map(|target| {
            let scope = build_scope(arena, document, &target, Some(id), true, path);
            (target, scope)
        })
        .collect();
    path.pop();

    let named_props = index_named_props(arena, &children);
    if let Some(record) = arena.get_mut(id) {
        record.children = children;
        record.transcluded = transcluded.into_iter().collect();
        record.named_props = named_props;
    }
    id
}

/// First child with a given key wins.
fn index_named_props(
    arena: &Arena<ScopeRecord>,
    children: &[ScopeId],
) -> indexmap::IndexMap<String, ScopeId> {
    let mut props = indexmap::IndexMap::new();
    for child in children {
        if let Some(key) = arena.get(*child).and_then(|r| r.bullet.key_name()) {
            props.entry(key.to_string()).or_insert(*child);
        }
    }
    props
}

fn subtree_ids(arena: &Arena<ScopeRecord>, root: ScopeId) -> Vec<ScopeId> {
    let mut ids = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if let Some(record) = arena.get(id) {
            ids.push(id);
            stack.extend(record.children.iter().copied());
            stack.extend(record.transcluded.values().copied());
        }
    }
    ids
}

fn ancestor_nodes(arena: &Arena<ScopeRecord>, mut current: Option<ScopeId>) -> Vec<NodeId> {
    let mut nodes = Vec::new();
    while let Some(id) = current {
        let Some(record) = arena.get(id) else {
            break;
        };
        nodes.push(record.node_id.clone());
        current = record.parent;
    }
    nodes.reverse();
    nodes
}

/// Put `new` where `old` was in the parent and reindex named properties.
fn splice(arena: &mut Arena<ScopeRecord>, parent: ScopeId, old: ScopeId, new: ScopeId, node: &NodeId) {
    let children = match arena.get_mut(parent) {
        Some(record) => {
            if let Some(slot) = record.children.iter_mut().find(|id| **id == old) {
                *slot = new;
            } else if let Some(slot) = record.transcluded.get_mut(node) {
                *slot = new;
            }
            record.children.clone()
        }
        None => return,
    };
    let named_props = index_named_props(arena, &children);
    if let Some(record) = arena.get_mut(parent) {
        record.named_props = named_props;
    }
}
