//! Outline Functions - Built-in Function Set
//!
//! The functions formulas can call, and the data providers behind the
//! ones that need outside information. Providers are reached only through
//! the traits in [`provider`]; HTTP implementations live in [`providers`],
//! deterministic test doubles in [`mock`], and every provider can be
//! wrapped in a bounded cache from [`cached`].
//!
//! # Example
//! ```ignore
//! let config = EngineConfig::from_env();
//! let providers = Arc::new(providers_from_config(&config));
//! let registry = Arc::new(builtin_registry(providers));
//! let tree = ScopeTree::build(&document, registry, config);
//! tree.evaluate_all()?;
//! ```

pub mod cached;
pub mod functions;
pub mod mock;
pub mod provider;
pub mod providers;

pub use cached::{
    CachedFlightProvider, CachedPlacesProvider, CachedRoutingProvider, CachedWeatherProvider,
};
pub use functions::{
    DaysFunction, DistanceFunction, FlightFunction, PlaceFunction, RouteFunction, SumFunction,
    WeatherFunction,
};
pub use mock::{
    MockControl, MockFlightProvider, MockPlacesProvider, MockRoutingProvider, MockWeatherProvider,
};
pub use provider::{
    FlightLeg, FlightProvider, FlightStatus, Place, PlacesProvider, ProviderRegistry, Route,
    RoutingProvider, WeatherProvider, WeatherReport,
};
pub use providers::{
    JsonFlightProvider, JsonPlacesProvider, OpenMeteoWeatherProvider, OsrmRoutingProvider,
    ProviderClient,
};

use outline_cache::CacheConfig;
use outline_core::EngineConfig;
use outline_engine::FunctionRegistry;
use std::sync::Arc;

// ============================================================================
// SETUP
// ============================================================================

/// Registry with `Get` and every built-in function.
///
/// Provider-backed functions are always registered; calling one whose
/// provider is missing evaluates to `Undefined`.
pub fn builtin_registry(providers: Arc<ProviderRegistry>) -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    registry.register(SumFunction);
    registry.register(DistanceFunction);
    registry.register(DaysFunction);
    registry.register(RouteFunction::new(Arc::clone(&providers)));
    registry.register(PlaceFunction::new(Arc::clone(&providers)));
    registry.register(WeatherFunction::new(Arc::clone(&providers)));
    registry.register(FlightFunction::new(providers));
    registry
}

/// HTTP providers for every configured endpoint, each behind its own
/// bounded cache.
pub fn providers_from_config(config: &EngineConfig) -> ProviderRegistry {
    let rpm = config.providers.requests_per_minute;
    let mut registry = ProviderRegistry::new();

    if let Some(endpoint) = &config.providers.routing {
        registry.register_routing(Arc::new(OsrmRoutingProvider::new(endpoint, rpm)));
    }
    if let Some(endpoint) = &config.providers.places {
        registry.register_places(Arc::new(JsonPlacesProvider::new(endpoint, rpm)));
    }
    if let Some(endpoint) = &config.providers.weather {
        registry.register_weather(Arc::new(OpenMeteoWeatherProvider::new(endpoint, rpm)));
    }
    if let Some(endpoint) = &config.providers.flight {
        registry.register_flight(Arc::new(JsonFlightProvider::new(endpoint, rpm)));
    }

    tracing::debug!(providers = ?registry, "Configured data providers");
    registry.with_caching(&CacheConfig::from(&config.cache))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use outline_core::ProviderEndpoint;

    #[test]
    fn test_builtin_registry_names() {
        let registry = builtin_registry(Arc::new(ProviderRegistry::new()));
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(
            names,
            vec!["Get", "Sum", "Distance", "Days", "Route", "Place", "Weather", "Flight"]
        );
    }

    #[test]
    fn test_providers_from_config_registers_configured_only() {
        let mut config = EngineConfig::default();
        config.providers.routing = Some(ProviderEndpoint {
            base_url: "http://localhost:5000".to_string(),
            api_key: None,
        });

        let providers = providers_from_config(&config);
        assert!(providers.has_routing());
        assert!(!providers.has_weather());
        assert_eq!(providers.routing().unwrap().provider_id(), "osrm");
    }

    #[test]
    fn test_declared_parameters() {
        let registry = builtin_registry(Arc::new(ProviderRegistry::new()));
        let days = registry.get("Days").unwrap();
        let params: Vec<String> = days.parameters().into_iter().map(|p| p.name).collect();
        assert_eq!(params, vec!["from", "to"]);
        assert!(registry.get("Sum").unwrap().parameters().is_empty());
    }
}
