//! Built-in functions
//!
//! Pure functions (`Sum`, `Distance`, `Days`) compute from their arguments
//! alone. Provider-backed functions (`Route`, `Place`, `Weather`,
//! `Flight`) ask a [`ProviderRegistry`](crate::ProviderRegistry) and
//! publish the full response as a computation result next to their
//! textual value.
//!
//! Every function follows the same argument contract: a required slot that
//! is absent or empty yields [`Value::MissingArguments`]; a slot holding a
//! value of the wrong type is an error, which the evaluator turns into
//! `Undefined`.

pub mod dates;
pub mod flight;
pub mod geo;
pub mod place;
pub mod sum;
pub mod weather;

pub use dates::DaysFunction;
pub use flight::FlightFunction;
pub use geo::{DistanceFunction, RouteFunction};
pub use place::PlaceFunction;
pub use sum::SumFunction;
pub use weather::WeatherFunction;

use outline_core::{EvalError, OutlineError, Value};
use outline_engine::{ArgSlot, CallArgs, ScopeHandle};

/// A declared argument after resolution.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    /// Absent, written empty, or resolved to nothing.
    Missing,
    Value(Value),
}

impl Slot {
    pub(crate) fn into_option(self) -> Option<Value> {
        match self {
            Slot::Missing => None,
            Slot::Value(v) => Some(v),
        }
    }
}

/// Read a declared argument by name or position and follow transclusions
/// to their typed value.
pub(crate) async fn slot(scope: &ScopeHandle, args: &CallArgs, name: &str, index: usize) -> Slot {
    match args.slot(name, index) {
        ArgSlot::Absent | ArgSlot::Empty => Slot::Missing,
        ArgSlot::Present(value) => match typed(scope, value).await {
            Value::Undefined => Slot::Missing,
            resolved => Slot::Value(resolved),
        },
    }
}

/// Follow a `Value::Scope` to the most specific typed value of that scope.
pub(crate) async fn typed(scope: &ScopeHandle, value: &Value) -> Value {
    match value {
        Value::Scope(id) => match scope.tree().handle(*id) {
            Some(target) => {
                let plain = target.value_async().await;
                target.typed_value().unwrap_or(plain)
            }
            None => Value::Undefined,
        },
        other => other.clone(),
    }
}

pub(crate) fn invalid_argument(function: &str, argument: &str, got: &Value) -> OutlineError {
    OutlineError::Eval(EvalError::InvalidArgument {
        function: function.to_string(),
        argument: argument.to_string(),
        reason: format!("unexpected value {:?}", got),
    })
}

/// Log a provider failure before it is contained by the evaluator.
pub(crate) fn provider_failure(function: &str, error: OutlineError) -> OutlineError {
    tracing::warn!(function, error = %error, "Provider call failed");
    error
}
