//! `Sum(a, b, ...)`: numeric total of its arguments, or of the scope's
//! children when called without arguments.

use super::typed;
use async_trait::async_trait;
use futures_util::future::join_all;
use outline_core::{OutlineResult, Value, ValueType};
use outline_engine::{CallArgs, Parameter, Relationship, ScopeFunction, ScopeHandle, Suggestion};

pub struct SumFunction;

#[async_trait]
impl ScopeFunction for SumFunction {
    fn name(&self) -> &str {
        "Sum"
    }

    async fn call(&self, args: CallArgs, scope: &ScopeHandle) -> OutlineResult<Value> {
        let values: Vec<Value> = if args.is_empty() {
            let children = scope.children();
            join_all(children.iter().map(|child| async move {
                child.value_async().await;
                child.typed_value().unwrap_or_default()
            }))
            .await
        } else {
            let all = args.positional.iter().chain(args.named.values());
            join_all(all.map(|value| typed(scope, value))).await
        };
        Ok(Value::Number(total(&values)))
    }

    fn suggestions(&self, parameters: &[Parameter]) -> Vec<Suggestion> {
        let numeric_children = parameters
            .iter()
            .filter(|p| p.relationship == Relationship::SelfScope && p.distance == 1)
            .filter(|p| p.value_type == ValueType::Number)
            .count();
        if numeric_children >= 2 {
            vec![Suggestion::call("Sum", Vec::new(), Some(1))]
        } else {
            Vec::new()
        }
    }

    fn autocomplete(&self) -> Option<Suggestion> {
        Some(Suggestion::template("Sum", &[]))
    }

    fn summary(&self) -> &str {
        "Add numbers, or the numbers below this bullet"
    }
}

/// Sum of every numeric value, descending into lists. Everything else is
/// skipped.
fn total(values: &[Value]) -> f64 {
    values
        .iter()
        .map(|value| match value {
            Value::List(items) => total(items),
            Value::Number(n) => *n,
            other => other.as_number().unwrap_or(0.0),
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_skips_non_numeric() {
        let values = vec![
            Value::Number(2.0),
            Value::text("3"),
            Value::text("abc"),
            Value::Undefined,
            Value::List(vec![Value::Number(1.5), Value::Number(0.5)]),
        ];
        assert_eq!(total(&values), 7.0);
    }

    #[test]
    fn test_total_empty_is_zero() {
        assert_eq!(total(&[]), 0.0);
    }

    #[test]
    fn test_autocomplete_template() {
        assert_eq!(SumFunction.autocomplete().unwrap().expression, "{Sum()}");
    }
}
