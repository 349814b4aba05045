//! Update notification channel
//!
//! Evaluation tasks never call handlers directly. On completion they post a
//! [`ScopeEvent`] on an unbounded channel; a single dispatcher task drains
//! the channel and walks from the origin scope up to the root, invoking the
//! handlers registered on each scope. Propagation is strictly upward.

use crate::tree::TreeInner;
use outline_core::ScopeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::mpsc;

// ============================================================================
// TYPES
// ============================================================================

/// What changed on the origin scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateKind {
    /// The scope's evaluation finished.
    Resolved,
    /// A function published a computation result on the scope.
    ComputationResult,
}

/// Delivered to every handler on the path from the origin to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeUpdate {
    /// Scope whose state changed.
    pub origin: ScopeId,
    /// Scope whose handler is being invoked.
    pub scope: ScopeId,
    pub kind: UpdateKind,
}

/// Callback registered on a scope.
pub type UpdateHandler = Arc<dyn Fn(&ScopeUpdate) + Send + Sync>;

/// Registration token, used to unregister a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Message posted by evaluation tasks.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScopeEvent {
    pub scope: ScopeId,
    pub kind: UpdateKind,
}

// ============================================================================
// HANDLER TABLE
// ============================================================================

#[derive(Default)]
pub(crate) struct HandlerTable {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<ScopeId, Vec<(HandlerId, UpdateHandler)>>>,
}

impl HandlerTable {
    pub fn register(&self, scope: ScopeId, handler: UpdateHandler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Handler table lock was poisoned, recovering");
            poisoned.into_inner()
        });
        handlers.entry(scope).or_default().push((id, handler));
        id
    }

    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Handler table lock was poisoned, recovering");
            poisoned.into_inner()
        });
        let mut removed = false;
        handlers.retain(|_, list| {
            let before = list.len();
            list.retain(|(hid, _)| *hid != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    /// Move every handler of `from` to `to`.
    pub fn transfer(&self, from: ScopeId, to: ScopeId) {
        let mut handlers = self.handlers.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Handler table lock was poisoned, recovering");
            poisoned.into_inner()
        });
        if let Some(moved) = handlers.remove(&from) {
            handlers.entry(to).or_default().extend(moved);
        }
    }

    /// Drop every handler of a freed scope.
    pub fn remove_scope(&self, scope: ScopeId) {
        let mut handlers = self.handlers.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Handler table lock was poisoned, recovering");
            poisoned.into_inner()
        });
        handlers.remove(&scope);
    }

    pub fn handlers_for(&self, scope: ScopeId) -> Vec<UpdateHandler> {
        let handlers = self.handlers.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Handler table lock was poisoned, recovering");
            poisoned.into_inner()
        });
        handlers
            .get(&scope)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

/// Spawn the dispatcher on the current runtime.
///
/// The task holds only a weak reference to the tree; it exits once the tree
/// is dropped and the channel closes.
pub(crate) fn spawn_dispatcher(tree: Weak<TreeInner>, mut rx: mpsc::UnboundedReceiver<ScopeEvent>) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Some(inner) = tree.upgrade() else {
                break;
            };
            dispatch(&inner, event);
        }
        tracing::trace!("Scope event dispatcher stopped");
    });
}

/// Invoke handlers from the origin scope upward. A disabled scope stops
/// propagation; a disabled origin is never reported.
pub(crate) fn dispatch(inner: &TreeInner, event: ScopeEvent) {
    let chain = inner.enabled_ancestor_chain(event.scope);

    for scope in chain {
        let update = ScopeUpdate {
            origin: event.scope,
            scope,
            kind: event.kind,
        };
        for handler in inner.handlers.handlers_for(scope) {
            if catch_unwind(AssertUnwindSafe(|| handler(&update))).is_err() {
                tracing::warn!(scope = %scope, "Update handler panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_register_and_unregister() {
        let table = HandlerTable::default();
        let scope = ScopeId::new(0, 0);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let id = table.register(
            scope,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(table.handlers_for(scope).len(), 1);

        assert!(table.unregister(id));
        assert!(!table.unregister(id));
        assert!(table.handlers_for(scope).is_empty());
    }

    #[test]
    fn test_remove_scope_drops_handlers() {
        let table = HandlerTable::default();
        let scope = ScopeId::new(3, 1);
        table.register(scope, Arc::new(|_| {}));
        table.register(scope, Arc::new(|_| {}));

        table.remove_scope(scope);
        assert!(table.handlers_for(scope).is_empty());
    }

    #[test]
    fn test_transfer_moves_handlers_and_ids() {
        let table = HandlerTable::default();
        let old = ScopeId::new(2, 0);
        let new = ScopeId::new(5, 0);
        let id = table.register(old, Arc::new(|_| {}));
        table.register(new, Arc::new(|_| {}));

        table.transfer(old, new);
        assert!(table.handlers_for(old).is_empty());
        assert_eq!(table.handlers_for(new).len(), 2);

        table.remove_scope(old);
        assert_eq!(table.handlers_for(new).len(), 2);
        assert!(table.unregister(id));
        assert_eq!(table.handlers_for(new).len(), 1);
    }
}
