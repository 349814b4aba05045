//! Mock-backed function registry shared by the integration tests.

#![allow(dead_code)]

use outline_cache::CacheConfig;
use outline_core::LatLng;
use outline_functions::{
    builtin_registry, MockControl, MockFlightProvider, MockPlacesProvider, MockRoutingProvider,
    MockWeatherProvider, ProviderRegistry,
};
use outline_test_utils::{fixtures, InMemoryDocument, ScopeTree};
use std::sync::Arc;
use std::time::Duration;

pub struct Controls {
    pub routing: MockControl,
    pub places: MockControl,
    pub weather: MockControl,
    pub flight: MockControl,
}

pub struct Fixture {
    pub doc: InMemoryDocument,
    pub tree: ScopeTree,
    pub controls: Controls,
}

/// Every mock provider, each behind its own cache.
pub fn mock_providers() -> (ProviderRegistry, Controls) {
    let routing = MockRoutingProvider::new();
    let places = MockPlacesProvider::new()
        .with_place("eiffel", "Eiffel Tower", LatLng::new(48.8584, 2.2945))
        .with_place("brandenburg", "Brandenburg Gate", LatLng::new(52.5163, 13.3777));
    let weather = MockWeatherProvider::new();
    let flight = MockFlightProvider::new().with_flight("LH123", "FRA", "LHR");

    let controls = Controls {
        routing: routing.control(),
        places: places.control(),
        weather: weather.control(),
        flight: flight.control(),
    };

    let mut registry = ProviderRegistry::new();
    registry.register_routing(Arc::new(routing));
    registry.register_places(Arc::new(places));
    registry.register_weather(Arc::new(weather));
    registry.register_flight(Arc::new(flight));

    (registry.with_caching(&CacheConfig::default()), controls)
}

/// Build a tree over `outline` with the built-in functions backed by mocks.
pub fn fixture(outline: &str) -> Fixture {
    outline_test_utils::init_test_tracing();
    let (providers, controls) = mock_providers();
    let (doc, tree) = fixtures::tree(outline, builtin_registry(Arc::new(providers)));
    Fixture {
        doc,
        tree,
        controls,
    }
}

/// Same as [`fixture`] with no providers registered.
pub fn fixture_without_providers(outline: &str) -> Fixture {
    outline_test_utils::init_test_tracing();
    let (_, controls) = mock_providers();
    let (doc, tree) = fixtures::tree(
        outline,
        builtin_registry(Arc::new(ProviderRegistry::new())),
    );
    Fixture {
        doc,
        tree,
        controls,
    }
}

/// Poll until `done` holds, failing after about a second.
pub async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..100 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
