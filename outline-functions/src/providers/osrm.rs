//! OSRM-compatible routing provider

use super::client::ProviderClient;
use super::invalid_response;
use crate::provider::{Route, RoutingProvider};
use async_trait::async_trait;
use outline_core::{LatLng, OutlineResult, ProviderEndpoint};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<RouteEntry>,
}

#[derive(Debug, Deserialize)]
struct RouteEntry {
    /// Metres.
    distance: f64,
    /// Seconds.
    duration: f64,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// GeoJSON order: `[lng, lat]`.
    coordinates: Vec<[f64; 2]>,
}

/// Routing through an OSRM `route/v1` service.
pub struct OsrmRoutingProvider {
    client: ProviderClient,
    profile: String,
}

impl OsrmRoutingProvider {
    /// Create a provider using the `driving` profile.
    ///
    /// # Arguments
    /// * `endpoint` - OSRM server, e.g. `https://router.project-osrm.org`
    /// * `requests_per_minute` - Request budget
    pub fn new(endpoint: &ProviderEndpoint, requests_per_minute: u32) -> Self {
        Self {
            client: ProviderClient::new("osrm", endpoint, requests_per_minute),
            profile: "driving".to_string(),
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }
}

#[async_trait]
impl RoutingProvider for OsrmRoutingProvider {
    async fn route(&self, from: LatLng, to: LatLng) -> OutlineResult<Route> {
        let path = format!(
            "route/v1/{}/{},{};{},{}",
            self.profile, from.lng, from.lat, to.lng, to.lat
        );
        let query = [
            ("overview", "full".to_string()),
            ("geometries", "geojson".to_string()),
        ];
        let response: RouteResponse = self.client.get_json(&path, &query).await?;
        parse_route(response)
    }

    fn provider_id(&self) -> &str {
        "osrm"
    }
}

fn parse_route(response: RouteResponse) -> OutlineResult<Route> {
    if response.code != "Ok" {
        return Err(invalid_response(
            "osrm",
            format!(
                "{}: {}",
                response.code,
                response.message.unwrap_or_default()
            ),
        ));
    }
    let best = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| invalid_response("osrm", "No route in response"))?;

    Ok(Route {
        distance_km: best.distance / 1000.0,
        duration_min: best.duration / 60.0,
        geometry: best
            .geometry
            .coordinates
            .into_iter()
            .map(|[lng, lat]| LatLng::new(lat, lng))
            .collect(),
    })
}

impl std::fmt::Debug for OsrmRoutingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsrmRoutingProvider")
            .field("client", &self.client)
            .field("profile", &self.profile)
            .finish()
    }
}
