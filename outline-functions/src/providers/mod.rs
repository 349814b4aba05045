//! HTTP data provider implementations
//!
//! Concrete implementations of the provider traits for public or
//! self-hosted HTTP services. Every client shares [`ProviderClient`] for
//! rate limiting and error mapping.

pub mod client;
pub mod flight;
pub mod open_meteo;
pub mod osrm;
pub mod places;

pub use client::ProviderClient;
pub use flight::JsonFlightProvider;
pub use open_meteo::OpenMeteoWeatherProvider;
pub use osrm::OsrmRoutingProvider;
pub use places::JsonPlacesProvider;

use outline_core::{OutlineError, ProviderError};

pub(crate) fn request_failed(provider: &str, status: u16, message: impl Into<String>) -> OutlineError {
    OutlineError::Provider(ProviderError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: u64) -> OutlineError {
    OutlineError::Provider(ProviderError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    })
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> OutlineError {
    OutlineError::Provider(ProviderError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}
