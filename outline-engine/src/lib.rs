//! Outline Engine - Scope Evaluation
//!
//! Turns a [`Document`](outline_core::Document) into a tree of scopes and
//! evaluates every bullet asynchronously.
//!
//! # Architecture
//!
//! ```text
//! Document ──build──► ScopeTree (generational arena of ScopeRecords)
//!                        │
//!                        ├─ evaluate_all(): one tokio task per scope,
//!                        │    parts and arguments joined concurrently
//!                        │
//!                        ├─ watch channel per scope ──► values_async()
//!                        │
//!                        └─ mpsc events ──► dispatcher ──► update handlers
//!                                               (origin → root, upward only)
//!
//! Resolved tree ──► suggest::get_suggested_functions()
//!               └─► generalize::repeat_formula() ──► Document inserts
//! ```
//!
//! Lookup of a name starts at the parent of the asking scope. A
//! transcluded scope is parented to the scope that references it, so names
//! inside transcluded content resolve at the reference site.

pub mod arena;
pub mod eval;
pub mod generalize;
pub mod notify;
pub mod registry;
pub mod scope;
pub mod suggest;
pub mod tree;

pub use arena::Arena;
pub use eval::{eval_bullet, eval_expr};
pub use generalize::{
    repeat_formula, AnchorArgument, ExtractionRule, InsertedNode, OutputPosition, Pattern,
};
pub use notify::{HandlerId, ScopeUpdate, UpdateHandler, UpdateKind};
pub use registry::{ArgSlot, CallArgs, FunctionRegistry, GetFunction, ParameterSpec, ScopeFunction};
pub use scope::{ComputationResult, EvalState, ScopeHandle};
pub use suggest::{
    collect_parameters, get_suggested_functions, pairwise, parameters_of_type, single, Parameter,
    Relationship, Suggestion,
};
pub use tree::ScopeTree;
