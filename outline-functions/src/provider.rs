//! Data provider traits and registry.
//!
//! Provider-backed functions depend only on these traits, never on a
//! transport. HTTP clients live in [`crate::providers`], test doubles in
//! [`crate::mock`].

use async_trait::async_trait;
use chrono::NaiveDate;
use outline_core::{LatLng, OutlineError, OutlineResult, ProviderError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// Directions between two coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub distance_km: f64,
    pub duration_min: f64,
    /// Polyline from start to end.
    pub geometry: Vec<LatLng>,
}

impl Route {
    /// Summary record without the geometry.
    pub fn summary_value(&self) -> Value {
        record([
            ("distance_km", Value::Number(round_to(self.distance_km, 1))),
            ("duration_min", Value::Number(self.duration_min.round())),
        ])
    }

    pub fn to_value(&self) -> Value {
        let mut value = self.summary_value();
        if let Value::Record(map) = &mut value {
            map.insert(
                "geometry".to_string(),
                Value::List(self.geometry.iter().copied().map(Value::Location).collect()),
            );
        }
        value
    }
}

/// A resolved place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub location: LatLng,
}

impl Place {
    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("id".to_string(), Value::text(&self.id));
        map.insert("name".to_string(), Value::text(&self.name));
        if let Some(address) = &self.address {
            map.insert("address".to_string(), Value::text(address));
        }
        map.insert("location".to_string(), Value::Location(self.location));
        Value::Record(map)
    }
}

/// Daily weather for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub date: NaiveDate,
    pub min_c: f64,
    pub max_c: f64,
    pub mean_c: f64,
    /// WMO weather interpretation code.
    pub code: u16,
    /// Hourly temperatures, when the provider returns them.
    #[serde(default)]
    pub hourly_c: Vec<f64>,
}

impl WeatherReport {
    pub fn to_value(&self) -> Value {
        let mut value = record([
            ("min", Value::Number(self.min_c)),
            ("max", Value::Number(self.max_c)),
            ("mean", Value::Number(self.mean_c)),
            ("code", Value::Number(f64::from(self.code))),
        ]);
        if let Value::Record(map) = &mut value {
            map.insert("date".to_string(), Value::Date(self.date));
            if !self.hourly_c.is_empty() {
                map.insert(
                    "hourly".to_string(),
                    Value::List(self.hourly_c.iter().copied().map(Value::Number).collect()),
                );
            }
        }
        value
    }
}

/// One end of a flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightLeg {
    pub airport: String,
    /// Scheduled local time as reported by the provider.
    pub scheduled: String,
}

/// Status of one flight on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightStatus {
    pub flight_number: String,
    pub departure: FlightLeg,
    pub arrival: FlightLeg,
    #[serde(default)]
    pub status: Option<String>,
}

impl FlightStatus {
    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("flight".to_string(), Value::FlightNumber(self.flight_number.clone()));
        map.insert("from".to_string(), Value::text(&self.departure.airport));
        map.insert("departs".to_string(), Value::text(&self.departure.scheduled));
        map.insert("to".to_string(), Value::text(&self.arrival.airport));
        map.insert("arrives".to_string(), Value::text(&self.arrival.scheduled));
        if let Some(status) = &self.status {
            map.insert("status".to_string(), Value::text(status));
        }
        Value::Record(map)
    }
}

fn record<const N: usize>(fields: [(&str, Value); N]) -> Value {
    Value::Record(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

fn round_to(n: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (n * factor).round() / factor
}

// ============================================================================
// PROVIDER TRAITS
// ============================================================================

/// Directions lookup by two coordinates.
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    async fn route(&self, from: LatLng, to: LatLng) -> OutlineResult<Route>;

    /// Provider name used in logs and cache keys.
    fn provider_id(&self) -> &str;
}

/// Place lookup by provider place id.
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    async fn place(&self, place_id: &str) -> OutlineResult<Place>;

    fn provider_id(&self) -> &str;
}

/// Daily weather lookup by date and coordinates.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn weather(&self, date: NaiveDate, location: LatLng) -> OutlineResult<WeatherReport>;

    fn provider_id(&self) -> &str;
}

/// Flight status lookup by flight number and optional date.
#[async_trait]
pub trait FlightProvider: Send + Sync {
    async fn flight(&self, number: &str, date: Option<NaiveDate>) -> OutlineResult<FlightStatus>;

    fn provider_id(&self) -> &str;
}

// ============================================================================
// PROVIDER REGISTRY
// ============================================================================

/// Registry for data providers.
/// Providers must be explicitly registered - no auto-discovery.
///
/// # Example
/// ```ignore
/// let mut registry = ProviderRegistry::new();
/// registry.register_routing(Arc::new(OsrmRoutingProvider::new(endpoint, 60)));
///
/// let route = registry.routing()?.route(from, to).await?;
/// ```
#[derive(Clone)]
pub struct ProviderRegistry {
    routing: Option<Arc<dyn RoutingProvider>>,
    places: Option<Arc<dyn PlacesProvider>>,
    weather: Option<Arc<dyn WeatherProvider>>,
    flight: Option<Arc<dyn FlightProvider>>,
}

impl ProviderRegistry {
    /// Create a new empty provider registry.
    pub fn new() -> Self {
        Self {
            routing: None,
            places: None,
            weather: None,
            flight: None,
        }
    }

    /// Register a routing provider, replacing any previous one.
    pub fn register_routing(&mut self, provider: Arc<dyn RoutingProvider>) {
        self.routing = Some(provider);
    }

    pub fn register_places(&mut self, provider: Arc<dyn PlacesProvider>) {
        self.places = Some(provider);
    }

    pub fn register_weather(&mut self, provider: Arc<dyn WeatherProvider>) {
        self.weather = Some(provider);
    }

    pub fn register_flight(&mut self, provider: Arc<dyn FlightProvider>) {
        self.flight = Some(provider);
    }

    /// Get the registered routing provider.
    ///
    /// # Returns
    /// * `Ok(Arc<dyn RoutingProvider>)` - The provider
    /// * `Err(ProviderError::NotConfigured)` - If no provider registered
    pub fn routing(&self) -> OutlineResult<Arc<dyn RoutingProvider>> {
        self.routing.clone().ok_or_else(|| not_configured("routing"))
    }

    pub fn places(&self) -> OutlineResult<Arc<dyn PlacesProvider>> {
        self.places.clone().ok_or_else(|| not_configured("places"))
    }

    pub fn weather(&self) -> OutlineResult<Arc<dyn WeatherProvider>> {
        self.weather.clone().ok_or_else(|| not_configured("weather"))
    }

    pub fn flight(&self) -> OutlineResult<Arc<dyn FlightProvider>> {
        self.flight.clone().ok_or_else(|| not_configured("flight"))
    }

    pub fn has_routing(&self) -> bool {
        self.routing.is_some()
    }

    pub fn has_places(&self) -> bool {
        self.places.is_some()
    }

    pub fn has_weather(&self) -> bool {
        self.weather.is_some()
    }

    pub fn has_flight(&self) -> bool {
        self.flight.is_some()
    }

    pub fn clear_routing(&mut self) {
        self.routing = None;
    }

    pub fn clear_places(&mut self) {
        self.places = None;
    }

    pub fn clear_weather(&mut self) {
        self.weather = None;
    }

    pub fn clear_flight(&mut self) {
        self.flight = None;
    }
}

fn not_configured(provider: &str) -> OutlineError {
    OutlineError::Provider(ProviderError::NotConfigured {
        provider: provider.to_string(),
    })
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("routing", &self.routing.is_some())
            .field("places", &self.places.is_some())
            .field("weather", &self.weather.is_some())
            .field("flight", &self.flight.is_some())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRoutingProvider, MockWeatherProvider};

    #[test]
    fn test_provider_registry_new_is_empty() {
        let registry = ProviderRegistry::new();
        assert!(!registry.has_routing());
        assert!(!registry.has_places());
        assert!(!registry.has_weather());
        assert!(!registry.has_flight());
    }

    #[test]
    fn test_provider_registry_register_and_clear() {
        let mut registry = ProviderRegistry::new();
        registry.register_routing(Arc::new(MockRoutingProvider::new()));
        registry.register_weather(Arc::new(MockWeatherProvider::new()));
        assert!(registry.routing().is_ok());
        assert!(registry.weather().is_ok());

        registry.clear_routing();
        assert!(!registry.has_routing());
        assert!(registry.has_weather());
    }

    #[test]
    fn test_route_summary_value_rounds() {
        let route = Route {
            distance_km: 12.345,
            duration_min: 17.6,
            geometry: vec![LatLng::new(0.0, 0.0), LatLng::new(0.1, 0.1)],
        };
        assert_eq!(route.summary_value().field("distance_km"), Value::Number(12.3));
        assert_eq!(route.summary_value().field("duration_min"), Value::Number(18.0));
        assert_eq!(route.to_value().field("geometry").field("length"), Value::Number(2.0));
    }

    #[test]
    fn test_weather_report_value() {
        let report = WeatherReport {
            date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            min_c: 8.0,
            max_c: 19.5,
            mean_c: 13.2,
            code: 3,
            hourly_c: Vec::new(),
        };
        let value = report.to_value();
        assert_eq!(value.field("max"), Value::Number(19.5));
        assert_eq!(value.field("hourly"), Value::Undefined);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_provider() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("routing"),
            Just("places"),
            Just("weather"),
            Just("flight"),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: an unregistered provider is always reported as NotConfigured
        #[test]
        fn prop_registry_returns_error_when_not_configured(provider in arb_provider()) {
            let registry = ProviderRegistry::new();
            let result = match provider {
                "routing" => registry.routing().map(|_| ()),
                "places" => registry.places().map(|_| ()),
                "weather" => registry.weather().map(|_| ()),
                _ => registry.flight().map(|_| ()),
            };

            match result {
                Err(OutlineError::Provider(ProviderError::NotConfigured { provider: p })) => {
                    prop_assert_eq!(p, provider);
                }
                other => prop_assert!(false, "Expected NotConfigured, got {:?}", other),
            }
        }
    }
}
