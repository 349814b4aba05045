//! `Place(id: text)`: coordinates of a provider place id. Name and address
//! are published as the `place` computation result.

use super::{provider_failure, slot, Slot};
use crate::provider::ProviderRegistry;
use async_trait::async_trait;
use outline_core::{OutlineResult, Value, ValueType};
use outline_engine::{CallArgs, ParameterSpec, ScopeFunction, ScopeHandle, Suggestion};
use std::sync::Arc;

pub struct PlaceFunction {
    providers: Arc<ProviderRegistry>,
}

impl PlaceFunction {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl ScopeFunction for PlaceFunction {
    fn name(&self) -> &str {
        "Place"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::new("id", ValueType::Text)]
    }

    async fn call(&self, args: CallArgs, scope: &ScopeHandle) -> OutlineResult<Value> {
        let Slot::Value(id) = slot(scope, &args, "id", 0).await else {
            return Ok(Value::MissingArguments);
        };
        let place_id = id.display_text();
        if place_id.trim().is_empty() {
            return Ok(Value::MissingArguments);
        }

        let place = self
            .providers
            .places()?
            .place(place_id.trim())
            .await
            .map_err(|e| provider_failure("Place", e))?;

        scope.add_computation_result("place", place.to_value());
        Ok(Value::Location(place.location))
    }

    fn autocomplete(&self) -> Option<Suggestion> {
        Some(Suggestion::template("Place", &["id"]))
    }

    fn summary(&self) -> &str {
        "Look up a place and use its coordinates"
    }
}
