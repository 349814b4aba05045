//! Functions and helpers shared by the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use outline_core::{EngineConfig, EvalError, InMemoryDocument, OutlineResult, Value, ValueType};
use outline_engine::{
    pairwise, ArgSlot, CallArgs, FunctionRegistry, ParameterSpec, Parameter, ScopeFunction,
    ScopeHandle, ScopeTree, Suggestion,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records which function finished, in completion order.
pub type CompletionLog = Arc<Mutex<Vec<&'static str>>>;

/// Returns `"slow"` after a delay.
pub struct Slow {
    pub delay: Duration,
    pub log: CompletionLog,
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ScopeFunction for Slow {
    fn name(&self) -> &str {
        "Slow"
    }

    async fn call(&self, _args: CallArgs, _scope: &ScopeHandle) -> OutlineResult<Value> {
        tokio::time::sleep(self.delay).await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push("slow");
        Ok(Value::text("slow"))
    }
}

/// Returns `"fast"` immediately.
pub struct Fast {
    pub log: CompletionLog,
}

#[async_trait]
impl ScopeFunction for Fast {
    fn name(&self) -> &str {
        "Fast"
    }

    async fn call(&self, _args: CallArgs, _scope: &ScopeHandle) -> OutlineResult<Value> {
        self.log.lock().unwrap().push("fast");
        Ok(Value::text("fast"))
    }
}

pub struct Fail;

#[async_trait]
impl ScopeFunction for Fail {
    fn name(&self) -> &str {
        "Fail"
    }

    async fn call(&self, _args: CallArgs, _scope: &ScopeHandle) -> OutlineResult<Value> {
        Err(EvalError::ResolutionFailure {
            name: "anything".to_string(),
        }
        .into())
    }
}

pub struct Explode;

#[async_trait]
impl ScopeFunction for Explode {
    fn name(&self) -> &str {
        "Explode"
    }

    async fn call(&self, _args: CallArgs, _scope: &ScopeHandle) -> OutlineResult<Value> {
        panic!("boom");
    }
}

/// Kilometres between two transcluded locations.
pub struct Distance;

#[async_trait]
impl ScopeFunction for Distance {
    fn name(&self) -> &str {
        "Distance"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("from", ValueType::Location),
            ParameterSpec::new("to", ValueType::Location),
        ]
    }

    async fn call(&self, args: CallArgs, scope: &ScopeHandle) -> OutlineResult<Value> {
        let (from, to) = match (args.slot("from", 0), args.slot("to", 1)) {
            (ArgSlot::Present(from), ArgSlot::Present(to)) => (from.clone(), to.clone()),
            (ArgSlot::Empty, _) | (_, ArgSlot::Empty) => return Ok(Value::MissingArguments),
            _ => return Ok(Value::Undefined),
        };
        let from = scope.resolve(&from).await.as_location();
        let to = scope.resolve(&to).await.as_location();
        Ok(match (from, to) {
            (Some(a), Some(b)) => Value::Number(a.haversine_km(&b)),
            _ => Value::Undefined,
        })
    }

    fn suggestions(&self, parameters: &[Parameter]) -> Vec<Suggestion> {
        pairwise(
            "Distance",
            ("from", ValueType::Location),
            ("to", ValueType::Location),
            parameters,
        )
    }

    fn autocomplete(&self) -> Option<Suggestion> {
        Some(Suggestion::template("Distance", &["from", "to"]))
    }
}

/// Publishes a computation result on itself and every child.
pub struct Annotate;

#[async_trait]
impl ScopeFunction for Annotate {
    fn name(&self) -> &str {
        "Annotate"
    }

    async fn call(&self, _args: CallArgs, scope: &ScopeHandle) -> OutlineResult<Value> {
        if let Some(parent) = scope.parent() {
            for child in parent.children() {
                child.add_computation_result("note", Value::text("seen"));
            }
        }
        Ok(Value::Undefined)
    }
}

pub struct Fixture {
    pub doc: InMemoryDocument,
    pub tree: ScopeTree,
    pub log: CompletionLog,
    pub slow_calls: Arc<AtomicUsize>,
}

pub fn registry(log: &CompletionLog, slow_calls: &Arc<AtomicUsize>) -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    registry.register(Slow {
        delay: Duration::from_millis(40),
        log: Arc::clone(log),
        calls: Arc::clone(slow_calls),
    });
    registry.register(Fast {
        log: Arc::clone(log),
    });
    registry.register(Fail);
    registry.register(Explode);
    registry.register(Distance);
    registry.register(Annotate);
    registry
}

/// Build a tree over an outline with the test functions registered.
pub fn fixture(outline: &str) -> Fixture {
    let doc = InMemoryDocument::from_outline(outline).expect("invalid outline");
    let log: CompletionLog = Arc::default();
    let slow_calls = Arc::new(AtomicUsize::new(0));
    let tree = ScopeTree::build(
        &doc,
        Arc::new(registry(&log, &slow_calls)),
        EngineConfig::default(),
    );
    Fixture {
        doc,
        tree,
        log,
        slow_calls,
    }
}

/// Evaluate everything and wait for handlers to run.
pub async fn evaluate(tree: &ScopeTree) {
    tree.evaluate_all().expect("runtime available");
    settle(tree).await;
}

pub async fn settle(tree: &ScopeTree) {
    tree.settle().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
}

pub fn scope(tree: &ScopeTree, node: &str) -> ScopeHandle {
    tree.scope_for_node(&outline_core::NodeId::new(node))
        .unwrap_or_else(|| panic!("no scope for {}", node))
}
