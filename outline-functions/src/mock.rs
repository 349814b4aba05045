//! Mock providers for testing.
//!
//! All mocks answer deterministically without network access and count
//! their calls so cache behaviour can be asserted.

use crate::provider::{
    FlightLeg, FlightProvider, FlightStatus, Place, PlacesProvider, Route, RoutingProvider,
    WeatherProvider, WeatherReport,
};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use outline_core::{LatLng, OutlineError, OutlineResult, ProviderError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

fn unavailable(provider: &str) -> OutlineError {
    OutlineError::Provider(ProviderError::RequestFailed {
        provider: provider.to_string(),
        status: 503,
        message: "mock provider set to fail".to_string(),
    })
}

fn not_found(provider: &str, what: &str) -> OutlineError {
    OutlineError::Provider(ProviderError::RequestFailed {
        provider: provider.to_string(),
        status: 404,
        message: format!("{} not found", what),
    })
}

/// Shared call counter and failure switch.
#[derive(Debug, Clone, Default)]
pub struct MockControl {
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MockControl {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every following call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn enter(&self, provider: &str) -> OutlineResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable(provider));
        }
        Ok(())
    }
}

// ============================================================================
// ROUTING
// ============================================================================

/// Straight-line routing at a fixed average speed.
#[derive(Debug, Clone)]
pub struct MockRoutingProvider {
    speed_kmh: f64,
    control: MockControl,
}

impl MockRoutingProvider {
    pub fn new() -> Self {
        Self::with_speed(60.0)
    }

    pub fn with_speed(speed_kmh: f64) -> Self {
        Self {
            speed_kmh,
            control: MockControl::default(),
        }
    }

    pub fn control(&self) -> MockControl {
        self.control.clone()
    }
}

impl Default for MockRoutingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoutingProvider for MockRoutingProvider {
    async fn route(&self, from: LatLng, to: LatLng) -> OutlineResult<Route> {
        self.control.enter("mock-routing")?;
        let distance_km = from.haversine_km(&to);
        Ok(Route {
            distance_km,
            duration_min: distance_km / self.speed_kmh * 60.0,
            geometry: vec![from, to],
        })
    }

    fn provider_id(&self) -> &str {
        "mock-routing"
    }
}

// ============================================================================
// PLACES
// ============================================================================

/// Places served from a fixed table.
#[derive(Debug, Clone, Default)]
pub struct MockPlacesProvider {
    places: HashMap<String, Place>,
    control: MockControl,
}

impl MockPlacesProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, id: &str, name: &str, location: LatLng) -> Self {
        self.places.insert(
            id.to_string(),
            Place {
                id: id.to_string(),
                name: name.to_string(),
                address: None,
                location,
            },
        );
        self
    }

    pub fn control(&self) -> MockControl {
        self.control.clone()
    }
}

#[async_trait]
impl PlacesProvider for MockPlacesProvider {
    async fn place(&self, place_id: &str) -> OutlineResult<Place> {
        self.control.enter("mock-places")?;
        self.places
            .get(place_id)
            .cloned()
            .ok_or_else(|| not_found("mock-places", place_id))
    }

    fn provider_id(&self) -> &str {
        "mock-places"
    }
}

// ============================================================================
// WEATHER
// ============================================================================

/// Weather derived from the day of year and latitude.
#[derive(Debug, Clone, Default)]
pub struct MockWeatherProvider {
    control: MockControl,
}

impl MockWeatherProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn control(&self) -> MockControl {
        self.control.clone()
    }
}

#[async_trait]
impl WeatherProvider for MockWeatherProvider {
    async fn weather(&self, date: NaiveDate, location: LatLng) -> OutlineResult<WeatherReport> {
        self.control.enter("mock-weather")?;
        let season = (f64::from(date.ordinal()) / 365.0 * std::f64::consts::TAU).cos();
        let mean_c = (25.0 - location.lat.abs() * 0.4 - season * 8.0).round();
        Ok(WeatherReport {
            date,
            min_c: mean_c - 5.0,
            max_c: mean_c + 5.0,
            mean_c,
            code: (date.day() % 4) as u16,
            hourly_c: Vec::new(),
        })
    }

    fn provider_id(&self) -> &str {
        "mock-weather"
    }
}

// ============================================================================
// FLIGHTS
// ============================================================================

/// Flights served from a fixed table keyed by flight number.
#[derive(Debug, Clone, Default)]
pub struct MockFlightProvider {
    flights: HashMap<String, FlightStatus>,
    control: MockControl,
}

impl MockFlightProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flight(mut self, number: &str, from: &str, to: &str) -> Self {
        self.flights.insert(
            number.to_string(),
            FlightStatus {
                flight_number: number.to_string(),
                departure: FlightLeg {
                    airport: from.to_string(),
                    scheduled: "08:00".to_string(),
                },
                arrival: FlightLeg {
                    airport: to.to_string(),
                    scheduled: "10:30".to_string(),
                },
                status: Some("scheduled".to_string()),
            },
        );
        self
    }

    pub fn control(&self) -> MockControl {
        self.control.clone()
    }
}

#[async_trait]
impl FlightProvider for MockFlightProvider {
    async fn flight(&self, number: &str, _date: Option<NaiveDate>) -> OutlineResult<FlightStatus> {
        self.control.enter("mock-flight")?;
        self.flights
            .get(number)
            .cloned()
            .ok_or_else(|| not_found("mock-flight", number))
    }

    fn provider_id(&self) -> &str {
        "mock-flight"
    }
}
