//! Cached provider decorators.
//!
//! Each decorator implements the same trait as the provider it wraps and
//! memoizes successful responses in a bounded [`ReadThroughCache`]. Keys
//! are the provider id plus the request arguments, with coordinates
//! rounded to about a metre so float noise does not defeat the cache.

use crate::provider::{
    FlightProvider, FlightStatus, Place, PlacesProvider, ProviderRegistry, Route, RoutingProvider,
    WeatherProvider, WeatherReport,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use outline_cache::{CacheConfig, CacheKey, CacheStats, ReadThroughCache};
use outline_core::{LatLng, OutlineResult};
use std::sync::Arc;

fn coord(location: &LatLng) -> String {
    format!("{:.5},{:.5}", location.lat, location.lng)
}

fn day(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// ============================================================================
// ROUTING
// ============================================================================

pub struct CachedRoutingProvider {
    inner: Arc<dyn RoutingProvider>,
    cache: ReadThroughCache<Route>,
}

impl CachedRoutingProvider {
    pub fn new(inner: Arc<dyn RoutingProvider>, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: ReadThroughCache::in_memory(config),
        }
    }

    pub async fn stats(&self) -> OutlineResult<CacheStats> {
        self.cache.stats().await
    }
}

#[async_trait]
impl RoutingProvider for CachedRoutingProvider {
    async fn route(&self, from: LatLng, to: LatLng) -> OutlineResult<Route> {
        let namespace = format!("routing/{}", self.inner.provider_id());
        let key = CacheKey::from_parts(&namespace, &[&coord(&from), &coord(&to)]);
        let read = self
            .cache
            .get_or_fetch(key, || self.inner.route(from, to))
            .await?;
        Ok(read.into_value())
    }

    fn provider_id(&self) -> &str {
        self.inner.provider_id()
    }
}

// ============================================================================
// PLACES
// ============================================================================

pub struct CachedPlacesProvider {
    inner: Arc<dyn PlacesProvider>,
    cache: ReadThroughCache<Place>,
}

impl CachedPlacesProvider {
    pub fn new(inner: Arc<dyn PlacesProvider>, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: ReadThroughCache::in_memory(config),
        }
    }

    pub async fn stats(&self) -> OutlineResult<CacheStats> {
        self.cache.stats().await
    }
}

#[async_trait]
impl PlacesProvider for CachedPlacesProvider {
    async fn place(&self, place_id: &str) -> OutlineResult<Place> {
        let namespace = format!("places/{}", self.inner.provider_id());
        let key = CacheKey::from_parts(&namespace, &[place_id]);
        let read = self
            .cache
            .get_or_fetch(key, || self.inner.place(place_id))
            .await?;
        Ok(read.into_value())
    }

    fn provider_id(&self) -> &str {
        self.inner.provider_id()
    }
}

// ============================================================================
// WEATHER
// ============================================================================

pub struct CachedWeatherProvider {
    inner: Arc<dyn WeatherProvider>,
    cache: ReadThroughCache<WeatherReport>,
}

impl CachedWeatherProvider {
    pub fn new(inner: Arc<dyn WeatherProvider>, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: ReadThroughCache::in_memory(config),
        }
    }

    pub async fn stats(&self) -> OutlineResult<CacheStats> {
        self.cache.stats().await
    }
}

#[async_trait]
impl WeatherProvider for CachedWeatherProvider {
    async fn weather(&self, date: NaiveDate, location: LatLng) -> OutlineResult<WeatherReport> {
        let namespace = format!("weather/{}", self.inner.provider_id());
        let key = CacheKey::from_parts(&namespace, &[&day(&date), &coord(&location)]);
        let read = self
            .cache
            .get_or_fetch(key, || self.inner.weather(date, location))
            .await?;
        Ok(read.into_value())
    }

    fn provider_id(&self) -> &str {
        self.inner.provider_id()
    }
}

// ============================================================================
// FLIGHTS
// ============================================================================

pub struct CachedFlightProvider {
    inner: Arc<dyn FlightProvider>,
    cache: ReadThroughCache<FlightStatus>,
}

impl CachedFlightProvider {
    pub fn new(inner: Arc<dyn FlightProvider>, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: ReadThroughCache::in_memory(config),
        }
    }

    pub async fn stats(&self) -> OutlineResult<CacheStats> {
        self.cache.stats().await
    }
}

#[async_trait]
impl FlightProvider for CachedFlightProvider {
    async fn flight(&self, number: &str, date: Option<NaiveDate>) -> OutlineResult<FlightStatus> {
        let namespace = format!("flight/{}", self.inner.provider_id());
        let date_part = date.as_ref().map(day).unwrap_or_default();
        let key = CacheKey::from_parts(&namespace, &[number, &date_part]);
        let read = self
            .cache
            .get_or_fetch(key, || self.inner.flight(number, date))
            .await?;
        Ok(read.into_value())
    }

    fn provider_id(&self) -> &str {
        self.inner.provider_id()
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

impl ProviderRegistry {
    /// Wrap every registered provider in a cached decorator with its own
    /// bounded cache.
    pub fn with_caching(self, config: &CacheConfig) -> Self {
        let mut cached = ProviderRegistry::new();
        if let Ok(provider) = self.routing() {
            cached.register_routing(Arc::new(CachedRoutingProvider::new(provider, config.clone())));
        }
        if let Ok(provider) = self.places() {
            cached.register_places(Arc::new(CachedPlacesProvider::new(provider, config.clone())));
        }
        if let Ok(provider) = self.weather() {
            cached.register_weather(Arc::new(CachedWeatherProvider::new(provider, config.clone())));
        }
        if let Ok(provider) = self.flight() {
            cached.register_flight(Arc::new(CachedFlightProvider::new(provider, config.clone())));
        }
        cached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockFlightProvider, MockRoutingProvider, MockWeatherProvider};
    use std::time::Duration;

    #[tokio::test]
    async fn test_repeated_route_hits_cache() {
        let mock = MockRoutingProvider::new();
        let control = mock.control();
        let cached = CachedRoutingProvider::new(Arc::new(mock), CacheConfig::new());
        let (a, b) = (LatLng::new(52.52, 13.40), LatLng::new(48.14, 11.58));

        let first = cached.route(a, b).await.unwrap();
        let second = cached.route(a, b).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(control.calls(), 1);

        cached.route(b, a).await.unwrap();
        assert_eq!(control.calls(), 2);
        assert_eq!(cached.stats().await.unwrap().hits, 1);
    }

    #[tokio::test]
    async fn test_coordinate_noise_shares_entry() {
        let mock = MockRoutingProvider::new();
        let control = mock.control();
        let cached = CachedRoutingProvider::new(Arc::new(mock), CacheConfig::new());

        cached
            .route(LatLng::new(1.0, 2.0), LatLng::new(3.0, 4.0))
            .await
            .unwrap();
        cached
            .route(LatLng::new(1.000000001, 2.0), LatLng::new(3.0, 4.0))
            .await
            .unwrap();
        assert_eq!(control.calls(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_retried() {
        let mock = MockWeatherProvider::new();
        let control = mock.control();
        let cached = CachedWeatherProvider::new(Arc::new(mock), CacheConfig::new());
        let date = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let at = LatLng::new(40.0, -3.7);

        control.set_failing(true);
        assert!(cached.weather(date, at).await.is_err());
        control.set_failing(false);
        assert!(cached.weather(date, at).await.is_ok());
        assert!(cached.weather(date, at).await.is_ok());
        assert_eq!(control.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let mock = MockFlightProvider::new().with_flight("LH123", "FRA", "LHR");
        let control = mock.control();
        let config = CacheConfig::new().with_ttl(Duration::from_secs(60));
        let cached = CachedFlightProvider::new(Arc::new(mock), config);

        cached.flight("LH123", None).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        cached.flight("LH123", None).await.unwrap();
        assert_eq!(control.calls(), 2);
    }

    #[test]
    fn test_with_caching_keeps_registrations() {
        let mut registry = ProviderRegistry::new();
        registry.register_routing(Arc::new(MockRoutingProvider::new()));
        let cached = registry.with_caching(&CacheConfig::new());

        assert!(cached.has_routing());
        assert!(!cached.has_weather());
        assert_eq!(cached.routing().unwrap().provider_id(), "mock-routing");
    }
}
