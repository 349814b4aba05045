//! `Weather(location: location, date: date)`
//!
//! With a date, returns that day's report. Either way, every scope below
//! the call that carries a date (matching `date` when one is given)
//! receives a `weather` computation result for that day, so an itinerary
//! of dated bullets is annotated by a single formula.

use super::{invalid_argument, provider_failure, slot, Slot};
use crate::provider::{ProviderRegistry, WeatherProvider};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::future::join_all;
use outline_core::{LatLng, OutlineResult, Value, ValueType};
use outline_engine::{
    pairwise, single, CallArgs, Parameter, ParameterSpec, ScopeFunction, ScopeHandle, Suggestion,
};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct WeatherFunction {
    providers: Arc<ProviderRegistry>,
}

impl WeatherFunction {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl ScopeFunction for WeatherFunction {
    fn name(&self) -> &str {
        "Weather"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("location", ValueType::Location),
            ParameterSpec::new("date", ValueType::Date),
        ]
    }

    async fn call(&self, args: CallArgs, scope: &ScopeHandle) -> OutlineResult<Value> {
        let Slot::Value(location) = slot(scope, &args, "location", 0).await else {
            return Ok(Value::MissingArguments);
        };
        let location = location
            .as_location()
            .ok_or_else(|| invalid_argument("Weather", "location", &location))?;
        let date = match slot(scope, &args, "date", 1).await.into_option() {
            Some(value) => Some(
                value
                    .as_date()
                    .ok_or_else(|| invalid_argument("Weather", "date", &value))?,
            ),
            None => None,
        };

        let provider = self.providers.weather()?;
        let dated = dated_descendants(scope, date).await;
        let mut days: Vec<NaiveDate> = dated.iter().map(|(_, d)| *d).collect();
        days.extend(date);
        days.sort();
        days.dedup();

        let reports = fetch_all(provider.as_ref(), &days, location).await;
        for (target, day) in &dated {
            match reports.get(day) {
                Some(Ok(report)) => target.add_computation_result("weather", report.clone()),
                Some(Err(_)) | None => {}
            }
        }

        match date {
            Some(day) => match reports.get(&day) {
                Some(Ok(report)) => {
                    scope.add_computation_result("weather", report.clone());
                    Ok(report.clone())
                }
                Some(Err(e)) => Err(e.clone()),
                None => Ok(Value::Undefined),
            },
            None => {
                let annotated = dated
                    .iter()
                    .filter(|(_, d)| matches!(reports.get(d), Some(Ok(_))))
                    .count();
                Ok(Value::Number(annotated as f64))
            }
        }
    }

    fn suggestions(&self, parameters: &[Parameter]) -> Vec<Suggestion> {
        let mut suggestions = pairwise(
            "Weather",
            ("location", ValueType::Location),
            ("date", ValueType::Date),
            parameters,
        );
        suggestions.extend(single("Weather", "location", ValueType::Location, parameters));
        suggestions
    }

    fn autocomplete(&self) -> Option<Suggestion> {
        Some(Suggestion::template("Weather", &["location", "date"]))
    }

    fn summary(&self) -> &str {
        "Daily weather for a place, attached to every dated bullet below"
    }
}

/// Scopes below `scope` (transclusions excluded) whose typed value is a
/// date, restricted to `only` when given. Document order.
async fn dated_descendants(scope: &ScopeHandle, only: Option<NaiveDate>) -> Vec<(ScopeHandle, NaiveDate)> {
    let mut below = Vec::new();
    scope.traverse_scope(
        |s, _| {
            below.push(s.clone());
        },
        (),
        false,
    );
    // traverse_scope visits the scope itself first
    let below: Vec<ScopeHandle> = below.into_iter().skip(1).collect();

    join_all(below.iter().map(|s| s.values_async())).await;
    below
        .into_iter()
        .filter_map(|s| {
            let date = s.typed_value()?.as_date()?;
            match only {
                Some(wanted) if wanted != date => None,
                _ => Some((s, date)),
            }
        })
        .collect()
}

async fn fetch_all(
    provider: &dyn WeatherProvider,
    days: &[NaiveDate],
    location: LatLng,
) -> BTreeMap<NaiveDate, OutlineResult<Value>> {
    let results = join_all(days.iter().map(|day| async move {
        let result = provider
            .weather(*day, location)
            .await
            .map(|report| report.to_value())
            .map_err(|e| provider_failure("Weather", e));
        (*day, result)
    }))
    .await;
    results.into_iter().collect()
}
