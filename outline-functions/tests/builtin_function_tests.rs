//! Integration Tests for the Built-in Functions
//!
//! Every test builds a real scope tree over an outline and evaluates it
//! with the built-in registry backed by mock providers.

#[path = "support/providers.rs"]
mod support;

use chrono::NaiveDate;
use outline_core::{LatLng, Value};
use outline_engine::{get_suggested_functions, ScopeHandle};
use outline_test_utils::assertions::{
    assert_computation_result, assert_field, assert_missing_arguments, assert_number_near,
    assert_undefined,
};
use outline_test_utils::fixtures::{evaluate, scope, settle};
use support::{fixture, fixture_without_providers, wait_until};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn route_epoch(scope: &ScopeHandle) -> u64 {
    scope
        .computation_results()
        .iter()
        .find(|r| r.name == "route")
        .map(|r| r.epoch)
        .unwrap_or_default()
}

// ============================================================================
// PURE FUNCTIONS
// ============================================================================

#[tokio::test]
async fn test_sum_of_arguments() {
    let f = fixture("- [total] {Sum(1, 2, 3)}\n");
    evaluate(&f.tree).await;

    assert_eq!(scope(&f.tree, "total").value(), Value::Number(6.0));
}

#[tokio::test]
async fn test_sum_without_arguments_adds_children() {
    let f = fixture(
        "\
- [budget] {Sum()}
  - [hotel] 30
  - [food] 12
  - [notes] bring cash
",
    );
    evaluate(&f.tree).await;

    assert_eq!(scope(&f.tree, "budget").value(), Value::Number(42.0));
}

#[tokio::test]
async fn test_distance_between_transcluded_locations() {
    let f = fixture(
        "\
- [a] position: 0,0
- [b] position: 0,1
- [km] {Distance(from: #[a], to: #[b])}
",
    );
    evaluate(&f.tree).await;

    assert_number_near(&scope(&f.tree, "km").value(), 111.19, 0.01);
}

#[tokio::test]
async fn test_empty_slot_is_missing_arguments() {
    let f = fixture(
        "\
- [b] position: 0,1
- [km] {Distance(from:, to: #[b])}
- [days] {Days()}
",
    );
    evaluate(&f.tree).await;

    assert_missing_arguments(&scope(&f.tree, "km").value());
    assert_missing_arguments(&scope(&f.tree, "days").value());
}

#[tokio::test]
async fn test_days_between_dates() {
    let f = fixture(
        "\
- [start] 2026-05-01
- [end] 2026-05-08
- [nights] {Days(from: #[start], to: #[end])}
",
    );
    evaluate(&f.tree).await;

    assert_eq!(scope(&f.tree, "nights").value(), Value::Number(7.0));
}

#[tokio::test]
async fn test_wrong_argument_type_is_undefined() {
    let f = fixture(
        "\
- [start] 2026-05-01
- [here] position: 1,1
- [nights] {Days(from: #[start], to: #[here])}
",
    );
    evaluate(&f.tree).await;

    assert_undefined(&scope(&f.tree, "nights").value());
}

// ============================================================================
// PROVIDER-BACKED FUNCTIONS
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_route_publishes_full_route_and_reuses_cache() {
    let f = fixture(
        "\
- [a] position: 0,0
- [b] position: 0,1
- [drive] {Route(from: #[a], to: #[b])}
",
    );
    evaluate(&f.tree).await;

    let drive = scope(&f.tree, "drive");
    let summary = drive.value();
    assert_field(&summary, "distance_km", &Value::Number(111.2));
    assert_field(&summary, "duration_min", &Value::Number(111.0));

    let full = assert_computation_result(&drive, "route");
    assert_eq!(
        full.field("geometry"),
        Value::List(vec![
            Value::Location(LatLng::new(0.0, 0.0)),
            Value::Location(LatLng::new(0.0, 1.0)),
        ])
    );
    assert_eq!(f.controls.routing.calls(), 1);
    let first_epoch = route_epoch(&drive);

    f.tree.reevaluate(&drive).expect("reevaluate");
    wait_until(|| route_epoch(&drive) > first_epoch).await;
    assert_eq!(f.controls.routing.calls(), 1, "second route served from cache");
    assert_eq!(
        drive
            .computation_results()
            .iter()
            .filter(|r| r.name == "route")
            .count(),
        1,
        "re-evaluation replaces the earlier route"
    );
}

#[tokio::test]
async fn test_missing_provider_is_undefined() {
    let f = fixture_without_providers(
        "\
- [a] position: 0,0
- [b] position: 0,1
- [drive] {Route(from: #[a], to: #[b])}
- [km] {Distance(from: #[a], to: #[b])}
",
    );
    evaluate(&f.tree).await;

    assert_undefined(&scope(&f.tree, "drive").value());
    assert_number_near(&scope(&f.tree, "km").value(), 111.19, 0.01);
}

#[tokio::test]
async fn test_weather_annotates_dated_descendants() {
    let f = fixture(
        "\
- [paris] position: 48.8566,2.3522
- [trip] {Weather(location: #[paris])}
  - [d1] 2026-05-01
  - [d2] 2026-05-02
  - [packing] pack umbrella
",
    );
    evaluate(&f.tree).await;

    assert_eq!(scope(&f.tree, "trip").value(), Value::Number(2.0));

    let first = assert_computation_result(&scope(&f.tree, "d1"), "weather");
    assert_field(&first, "date", &Value::Date(date(2026, 5, 1)));
    let second = assert_computation_result(&scope(&f.tree, "d2"), "weather");
    assert_field(&second, "date", &Value::Date(date(2026, 5, 2)));
    assert!(scope(&f.tree, "packing").computation_results().is_empty());
    assert_eq!(f.controls.weather.calls(), 2);
}

#[tokio::test]
async fn test_weather_with_date_returns_report() {
    let f = fixture(
        "\
- [paris] position: 48.8566,2.3522
- [day] 2026-05-01
- [forecast] {Weather(location: #[paris], date: #[day])}
",
    );
    evaluate(&f.tree).await;

    let forecast = scope(&f.tree, "forecast");
    let report = forecast.value();
    assert_field(&report, "date", &Value::Date(date(2026, 5, 1)));
    let min = report.field("min").as_number().expect("min");
    let max = report.field("max").as_number().expect("max");
    assert!(min < max);
    assert_eq!(assert_computation_result(&forecast, "weather"), report);
}

#[tokio::test]
async fn test_place_coordinates_feed_distance() {
    let f = fixture(
        "\
- [pid] eiffel
- [home] {Place(id: #[pid])}
- [gate] position: 52.5163,13.3777
- [km] {Distance(from: #[home], to: #[gate])}
- [bad] atlantis
- [unknown] {Place(id: #[bad])}
",
    );
    evaluate(&f.tree).await;

    let home = scope(&f.tree, "home");
    let eiffel = LatLng::new(48.8584, 2.2945);
    assert_eq!(home.value(), Value::Location(eiffel));
    assert_field(
        &assert_computation_result(&home, "place"),
        "name",
        &Value::text("Eiffel Tower"),
    );

    let expected = eiffel.haversine_km(&LatLng::new(52.5163, 13.3777));
    assert_number_near(&scope(&f.tree, "km").value(), expected, 1e-6);
    assert_undefined(&scope(&f.tree, "unknown").value());
}

#[tokio::test]
async fn test_flight_record() {
    let f = fixture(
        "\
- [fl] LH123
- [status] {Flight(number: #[fl])}
",
    );
    evaluate(&f.tree).await;

    let status = scope(&f.tree, "status");
    let record = status.value();
    assert_field(&record, "from", &Value::text("FRA"));
    assert_field(&record, "to", &Value::text("LHR"));
    assert_field(&record, "flight", &Value::FlightNumber("LH123".to_string()));
    assert_eq!(assert_computation_result(&status, "flight"), record);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_provider_failure_is_contained_and_not_cached() {
    let f = fixture(
        "\
- [paris] position: 48.8566,2.3522
- [day] 2026-05-01
- [forecast] {Weather(location: #[paris], date: #[day])}
- [total] {Sum(1, 2)}
",
    );
    f.controls.weather.set_failing(true);
    evaluate(&f.tree).await;

    let forecast = scope(&f.tree, "forecast");
    assert_undefined(&forecast.value());
    assert_eq!(scope(&f.tree, "total").value(), Value::Number(3.0));

    f.controls.weather.set_failing(false);
    f.tree.reevaluate(&forecast).expect("reevaluate");
    settle(&f.tree).await;
    wait_until(|| matches!(forecast.value(), Value::Record(_))).await;
    assert_eq!(f.controls.weather.calls(), 2);
}

// ============================================================================
// SUGGESTIONS
// ============================================================================

#[tokio::test]
async fn test_suggestions_for_locations_between_siblings() {
    let f = fixture(
        "\
- [trip] trip
  - [a] position: 1,1
  - [here] here
  - [b] position: 2,2
",
    );
    evaluate(&f.tree).await;

    let suggestions = get_suggested_functions(&scope(&f.tree, "here"));
    let expressions: Vec<&str> = suggestions.iter().map(|s| s.expression.as_str()).collect();

    assert!(expressions.contains(&"{Distance(from: #[a], to: #[b])}"));
    assert!(expressions.contains(&"{Route(from: #[a], to: #[b])}"));
    assert!(suggestions
        .iter()
        .any(|s| s.function == "Weather" && s.rank.is_some()));
    assert!(!suggestions
        .iter()
        .any(|s| s.function == "Days" && s.rank.is_some()));

    // Ranked suggestions first, autocomplete fallbacks last.
    let first_fallback = suggestions
        .iter()
        .position(|s| s.rank.is_none())
        .expect("fallbacks present");
    assert!(suggestions[first_fallback..].iter().all(|s| s.rank.is_none()));
    assert!(suggestions[first_fallback..]
        .iter()
        .any(|s| s.expression == "{Flight(number:, date:)}"));
}

#[tokio::test]
async fn test_sum_suggested_over_numeric_children() {
    let f = fixture(
        "\
- [budget] budget
  - [hotel] 30
  - [food] 12
",
    );
    evaluate(&f.tree).await;

    let suggestions = get_suggested_functions(&scope(&f.tree, "budget"));
    assert!(suggestions
        .iter()
        .any(|s| s.expression == "{Sum()}" && s.rank == Some(1)));
}
