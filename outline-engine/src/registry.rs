//! Function registry
//!
//! Functions are explicitly registered; there is no discovery. The engine
//! only ever needs `Get`, which [`FunctionRegistry::new`] registers.

use crate::scope::ScopeHandle;
use crate::suggest::{Parameter, Suggestion};
use async_trait::async_trait;
use indexmap::IndexMap;
use outline_core::{OutlineResult, Value, ValueType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// FUNCTION TRAIT
// ============================================================================

/// A declared, typed argument of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub value_type: ValueType,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// A function callable from expressions.
///
/// Implementations must be thread-safe. A failing call should return `Err`
/// (or `Ok(Value::Undefined)`); the evaluator contains both so that one
/// broken expression never stops its siblings.
///
/// # Example
/// ```ignore
/// struct Twice;
///
/// #[async_trait]
/// impl ScopeFunction for Twice {
///     fn name(&self) -> &str { "Twice" }
///
///     async fn call(&self, args: CallArgs, _scope: &ScopeHandle) -> OutlineResult<Value> {
///         Ok(args.positional(0).binary(BinaryOp::Mul, &Value::Number(2.0)))
///     }
/// }
/// ```
#[async_trait]
pub trait ScopeFunction: Send + Sync {
    /// Name used in expressions, e.g. `Distance`.
    fn name(&self) -> &str;

    /// Declared arguments, in positional order.
    fn parameters(&self) -> Vec<ParameterSpec> {
        Vec::new()
    }

    /// Evaluate a call.
    ///
    /// # Arguments
    /// * `args` - Evaluated positional and named arguments
    /// * `scope` - Scope whose bullet contains the call
    async fn call(&self, args: CallArgs, scope: &ScopeHandle) -> OutlineResult<Value>;

    /// Ranked suggestions built from the typed values near a scope.
    fn suggestions(&self, _parameters: &[Parameter]) -> Vec<Suggestion> {
        Vec::new()
    }

    /// Unranked fallback entry offered by autocomplete.
    fn autocomplete(&self) -> Option<Suggestion> {
        None
    }

    /// One-line description for the UI.
    fn summary(&self) -> &str {
        ""
    }
}

// ============================================================================
// CALL ARGUMENTS
// ============================================================================

/// Evaluated arguments of one call, split into positional and named
/// buckets. Order is preserved within each bucket; a repeated name keeps
/// its first value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub named: IndexMap<String, Value>,
}

/// State of a declared argument slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgSlot<'a> {
    /// Not written at all.
    Absent,
    /// Written but empty (`near:`) or resolved to nothing.
    Empty,
    Present(&'a Value),
}

impl ArgSlot<'_> {
    pub fn value(&self) -> Option<&Value> {
        match self {
            ArgSlot::Present(value) => Some(value),
            _ => None,
        }
    }
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: IndexMap::new(),
        }
    }

    pub fn push(&mut self, value: Value) {
        self.positional.push(value);
    }

    /// Add a named argument unless the name is already taken.
    pub fn insert_named(&mut self, name: impl Into<String>, value: Value) {
        self.named.entry(name.into()).or_insert(value);
    }

    /// Positional value at `index`, `Undefined` if missing.
    pub fn positional(&self, index: usize) -> Value {
        self.positional.get(index).cloned().unwrap_or_default()
    }

    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// Look up a declared argument by name, falling back to its position.
    pub fn slot(&self, name: &str, index: usize) -> ArgSlot<'_> {
        let value = self.named.get(name).or_else(|| self.positional.get(index));
        match value {
            None => ArgSlot::Absent,
            Some(value) if value.is_undefined() => ArgSlot::Empty,
            Some(value) => ArgSlot::Present(value),
        }
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Name → function table, in registration order.
///
/// # Example
/// ```ignore
/// let mut registry = FunctionRegistry::new();
/// registry.register(DistanceFunction);
/// let tree = ScopeTree::build(&doc, Arc::new(registry), EngineConfig::default());
/// ```
pub struct FunctionRegistry {
    functions: IndexMap<String, Arc<dyn ScopeFunction>>,
}

impl FunctionRegistry {
    /// Registry holding only `Get`, which field access requires.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(GetFunction);
        registry
    }

    /// Registry without any function, not even `Get`.
    pub fn empty() -> Self {
        Self {
            functions: IndexMap::new(),
        }
    }

    /// Register a function. Replaces any function with the same name.
    pub fn register<F: ScopeFunction + 'static>(&mut self, function: F) {
        self.register_arc(Arc::new(function));
    }

    pub fn register_arc(&mut self, function: Arc<dyn ScopeFunction>) {
        let name = function.name().to_string();
        if self.functions.insert(name.clone(), function).is_some() {
            tracing::debug!(function = %name, "Replaced registered function");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ScopeFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ScopeFunction>> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// GET
// ============================================================================

/// Field access: `obj.field` evaluates as `Get(obj, "field")`.
///
/// On a transcluded scope the field names a property child; on any other
/// value it reads a record field or a component such as `lat`.
pub struct GetFunction;

#[async_trait]
impl ScopeFunction for GetFunction {
    fn name(&self) -> &str {
        "Get"
    }

    async fn call(&self, args: CallArgs, scope: &ScopeHandle) -> OutlineResult<Value> {
        let object = args.positional(0);
        let field = args.positional(1).display_text();

        if let Value::Scope(id) = object {
            let Some(target) = scope.tree().handle(id) else {
                return Ok(Value::Undefined);
            };
            if let Some(property) = target.property_scope(&field) {
                return Ok(property.value_async().await);
            }
            return Ok(target.value_async().await.field(&field));
        }
        Ok(object.field(&field))
    }

    fn summary(&self) -> &str {
        "Read a property or field of a value"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl ScopeFunction for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn call(&self, _args: CallArgs, _scope: &ScopeHandle) -> OutlineResult<Value> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_new_registers_get() {
        let registry = FunctionRegistry::new();
        assert!(registry.contains("Get"));
        assert!(FunctionRegistry::empty().is_empty());
    }

    #[test]
    fn test_register_keeps_order_and_replaces() {
        let mut registry = FunctionRegistry::empty();
        registry.register(Named("B"));
        registry.register(Named("A"));
        registry.register(Named("B"));

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["B", "A"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_call_args_first_name_wins() {
        let mut args = CallArgs::new();
        args.insert_named("near", Value::Number(1.0));
        args.insert_named("near", Value::Number(2.0));
        assert_eq!(args.named("near"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_call_args_slots() {
        let mut args = CallArgs::from_positional(vec![Value::Number(4.0)]);
        args.insert_named("to", Value::Undefined);

        assert_eq!(args.slot("from", 0), ArgSlot::Present(&Value::Number(4.0)));
        assert_eq!(args.slot("to", 1), ArgSlot::Empty);
        assert_eq!(args.slot("via", 2), ArgSlot::Absent);
        assert_eq!(args.slot("from", 0).value(), Some(&Value::Number(4.0)));
    }
}
