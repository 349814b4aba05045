//! Functions over pairs of locations.

use super::{invalid_argument, provider_failure, slot, Slot};
use crate::provider::ProviderRegistry;
use async_trait::async_trait;
use outline_core::{LatLng, OutlineResult, Value, ValueType};
use outline_engine::{
    pairwise, CallArgs, Parameter, ParameterSpec, ScopeFunction, ScopeHandle, Suggestion,
};
use std::sync::Arc;

fn location_parameters() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::new("from", ValueType::Location),
        ParameterSpec::new("to", ValueType::Location),
    ]
}

/// Resolve `from` and `to`. `Ok(None)` when either slot is missing.
async fn endpoints(
    function: &str,
    args: &CallArgs,
    scope: &ScopeHandle,
) -> OutlineResult<Option<(LatLng, LatLng)>> {
    let (Slot::Value(from), Slot::Value(to)) =
        (slot(scope, args, "from", 0).await, slot(scope, args, "to", 1).await)
    else {
        return Ok(None);
    };
    let a = from
        .as_location()
        .ok_or_else(|| invalid_argument(function, "from", &from))?;
    let b = to
        .as_location()
        .ok_or_else(|| invalid_argument(function, "to", &to))?;
    Ok(Some((a, b)))
}

// ============================================================================
// DISTANCE
// ============================================================================

/// `Distance(from: location, to: location)`: great-circle kilometres.
pub struct DistanceFunction;

#[async_trait]
impl ScopeFunction for DistanceFunction {
    fn name(&self) -> &str {
        "Distance"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        location_parameters()
    }

    async fn call(&self, args: CallArgs, scope: &ScopeHandle) -> OutlineResult<Value> {
        Ok(match endpoints("Distance", &args, scope).await? {
            Some((from, to)) => Value::Number(from.haversine_km(&to)),
            None => Value::MissingArguments,
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

    fn summary(&self) -> &str {
        "Straight-line distance in kilometres"
    }
}

// ============================================================================
// ROUTE
// ============================================================================

/// `Route(from: location, to: location)`: travel distance and time from the
/// routing provider. The full route, geometry included, is published as
/// the `route` computation result.
pub struct RouteFunction {
    providers: Arc<ProviderRegistry>,
}

impl RouteFunction {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl ScopeFunction for RouteFunction {
    fn name(&self) -> &str {
        "Route"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        location_parameters()
    }

    async fn call(&self, args: CallArgs, scope: &ScopeHandle) -> OutlineResult<Value> {
        let Some((from, to)) = endpoints("Route", &args, scope).await? else {
            return Ok(Value::MissingArguments);
        };
        let route = self
            .providers
            .routing()?
            .route(from, to)
            .await
            .map_err(|e| provider_failure("Route", e))?;

        scope.add_computation_result("route", route.to_value());
        Ok(route.summary_value())
    }

    fn suggestions(&self, parameters: &[Parameter]) -> Vec<Suggestion> {
        pairwise(
            "Route",
            ("from", ValueType::Location),
            ("to", ValueType::Location),
            parameters,
        )
    }

    fn autocomplete(&self) -> Option<Suggestion> {
        Some(Suggestion::template("Route", &["from", "to"]))
    }

    fn summary(&self) -> &str {
        "Travel distance and duration between two places"
    }
}
