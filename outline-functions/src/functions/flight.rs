//! `Flight(number: flight, date: date)`: departure and arrival of a flight.
//! The date is optional and narrows the lookup to one day.

use super::{invalid_argument, provider_failure, slot, Slot};
use crate::provider::ProviderRegistry;
use async_trait::async_trait;
use outline_core::{OutlineResult, Value, ValueType};
use outline_engine::{
    pairwise, single, CallArgs, Parameter, ParameterSpec, ScopeFunction, ScopeHandle, Suggestion,
};
use std::sync::Arc;

pub struct FlightFunction {
    providers: Arc<ProviderRegistry>,
}

impl FlightFunction {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl ScopeFunction for FlightFunction {
    fn name(&self) -> &str {
        "Flight"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("number", ValueType::FlightNumber),
            ParameterSpec::new("date", ValueType::Date),
        ]
    }

    async fn call(&self, args: CallArgs, scope: &ScopeHandle) -> OutlineResult<Value> {
        let Slot::Value(number) = slot(scope, &args, "number", 0).await else {
            return Ok(Value::MissingArguments);
        };
        let number = match &number {
            Value::FlightNumber(n) => n.clone(),
            Value::Text(t) if !t.trim().is_empty() => t.trim().to_uppercase(),
            other => return Err(invalid_argument("Flight", "number", other)),
        };
        let date = match slot(scope, &args, "date", 1).await.into_option() {
            Some(value) => Some(
                value
                    .as_date()
                    .ok_or_else(|| invalid_argument("Flight", "date", &value))?,
            ),
            None => None,
        };

        let status = self
            .providers
            .flight()?
            .flight(&number, date)
            .await
            .map_err(|e| provider_failure("Flight", e))?;

        let value = status.to_value();
        scope.add_computation_result("flight", value.clone());
        Ok(value)
    }

    fn suggestions(&self, parameters: &[Parameter]) -> Vec<Suggestion> {
        let mut suggestions = pairwise(
            "Flight",
            ("number", ValueType::FlightNumber),
            ("date", ValueType::Date),
            parameters,
        );
        suggestions.extend(single("Flight", "number", ValueType::FlightNumber, parameters));
        suggestions
    }

    fn autocomplete(&self) -> Option<Suggestion> {
        Some(Suggestion::template("Flight", &["number", "date"]))
    }

    fn summary(&self) -> &str {
        "Departure and arrival of a flight"
    }
}
