//! `Days(from: date, to: date)`: whole days between two dates.

use super::{invalid_argument, slot, Slot};
use async_trait::async_trait;
use outline_core::{OutlineResult, Value, ValueType};
use outline_engine::{pairwise, CallArgs, ParameterSpec, Parameter, ScopeFunction, ScopeHandle, Suggestion};

pub struct DaysFunction;

#[async_trait]
impl ScopeFunction for DaysFunction {
    fn name(&self) -> &str {
        "Days"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("from", ValueType::Date),
            ParameterSpec::new("to", ValueType::Date),
        ]
    }

    async fn call(&self, args: CallArgs, scope: &ScopeHandle) -> OutlineResult<Value> {
        let (Slot::Value(from), Slot::Value(to)) =
            (slot(scope, &args, "from", 0).await, slot(scope, &args, "to", 1).await)
        else {
            return Ok(Value::MissingArguments);
        };
        let from_date = from
            .as_date()
            .ok_or_else(|| invalid_argument("Days", "from", &from))?;
        let to_date = to
            .as_date()
            .ok_or_else(|| invalid_argument("Days", "to", &to))?;
        Ok(Value::Number((to_date - from_date).num_days() as f64))
    }

    fn suggestions(&self, parameters: &[Parameter]) -> Vec<Suggestion> {
        pairwise("Days", ("from", ValueType::Date), ("to", ValueType::Date), parameters)
    }

    fn autocomplete(&self) -> Option<Suggestion> {
        Some(Suggestion::template("Days", &["from", "to"]))
    }

    fn summary(&self) -> &str {
        "Number of days between two dates"
    }
}
