//! Configuration types

use crate::{ConfigError, OutlineError, OutlineResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// ENGINE CONFIGURATION
// ============================================================================

/// Bounds for the suggestion engine's neighborhood search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    /// How many siblings to scan in each direction.
    pub max_sibling_distance: usize,
    /// How many parent hops to walk upward.
    pub max_ancestor_depth: usize,
    /// How deep to descend into sibling and transcluded subtrees.
    pub max_subtree_depth: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            max_sibling_distance: 8,
            max_ancestor_depth: 16,
            max_subtree_depth: 4,
        }
    }
}

/// Evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Upper bound on waiting for a referenced scope to resolve, in milliseconds.
    /// Mutually dependent name references resolve to undefined after this.
    pub resolution_timeout_ms: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            resolution_timeout_ms: 5_000,
        }
    }
}

impl EvaluationConfig {
    pub fn resolution_timeout(&self) -> Duration {
        Duration::from_millis(self.resolution_timeout_ms)
    }
}

/// Bounds applied to every provider cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_entries: usize,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            ttl_secs: 3600, // 1 hour
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Location and credentials of one external provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// External provider configuration. Unset providers stay unregistered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub routing: Option<ProviderEndpoint>,
    pub places: Option<ProviderEndpoint>,
    pub weather: Option<ProviderEndpoint>,
    pub flight: Option<ProviderEndpoint>,
    /// Per-provider request budget.
    pub requests_per_minute: u32,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            routing: None,
            places: None,
            weather: None,
            flight: None,
            requests_per_minute: 60,
        }
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub suggestion: SuggestionConfig,
    pub evaluation: EvaluationConfig,
    pub cache: CacheSettings,
    pub providers: ProvidersConfig,
}

impl EngineConfig {
    /// Parse a TOML configuration. Missing sections take their defaults.
    pub fn from_toml_str(source: &str) -> OutlineResult<Self> {
        let config: EngineConfig = toml::from_str(source).map_err(|e| {
            OutlineError::Config(ConfigError::Parse {
                reason: e.to_string(),
            })
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Overlay environment variables on this configuration.
    ///
    /// Environment variables:
    /// - `OUTLINE_RESOLUTION_TIMEOUT_MS`: Name resolution timeout (default: 5000)
    /// - `OUTLINE_MAX_SIBLING_DISTANCE`: Sibling search bound (default: 8)
    /// - `OUTLINE_MAX_ANCESTOR_DEPTH`: Ancestor search bound (default: 16)
    /// - `OUTLINE_CACHE_MAX_ENTRIES`: Entries per provider cache (default: 1024)
    /// - `OUTLINE_CACHE_TTL_SECS`: Provider cache TTL (default: 3600)
    /// - `OUTLINE_REQUESTS_PER_MINUTE`: Provider request budget (default: 60)
    /// - `OUTLINE_ROUTING_URL`, `OUTLINE_PLACES_URL`, `OUTLINE_WEATHER_URL`,
    ///   `OUTLINE_FLIGHT_URL`: Provider base URLs
    /// - `OUTLINE_PLACES_API_KEY`, `OUTLINE_FLIGHT_API_KEY`: Provider credentials
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(ms) = env_parse("OUTLINE_RESOLUTION_TIMEOUT_MS") {
            self.evaluation.resolution_timeout_ms = ms;
        }
        if let Some(n) = env_parse("OUTLINE_MAX_SIBLING_DISTANCE") {
            self.suggestion.max_sibling_distance = n;
        }
        if let Some(n) = env_parse("OUTLINE_MAX_ANCESTOR_DEPTH") {
            self.suggestion.max_ancestor_depth = n;
        }
        if let Some(n) = env_parse("OUTLINE_CACHE_MAX_ENTRIES") {
            self.cache.max_entries = n;
        }
        if let Some(secs) = env_parse("OUTLINE_CACHE_TTL_SECS") {
            self.cache.ttl_secs = secs;
        }
        if let Some(rpm) = env_parse("OUTLINE_REQUESTS_PER_MINUTE") {
            self.providers.requests_per_minute = rpm;
        }

        override_endpoint(&mut self.providers.routing, "OUTLINE_ROUTING_URL", None);
        override_endpoint(
            &mut self.providers.places,
            "OUTLINE_PLACES_URL",
            Some("OUTLINE_PLACES_API_KEY"),
        );
        override_endpoint(&mut self.providers.weather, "OUTLINE_WEATHER_URL", None);
        override_endpoint(
            &mut self.providers.flight,
            "OUTLINE_FLIGHT_URL",
            Some("OUTLINE_FLIGHT_API_KEY"),
        );
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - resolution timeout is positive
    /// - cache bounds are positive
    /// - provider request budget is positive
    /// - provider base URLs are http(s)
    pub fn validate(&self) -> OutlineResult<()> {
        if self.evaluation.resolution_timeout_ms == 0 {
            return Err(invalid(
                "evaluation.resolution_timeout_ms",
                "0",
                "resolution timeout must be positive",
            ));
        }

        if self.cache.max_entries == 0 {
            return Err(invalid(
                "cache.max_entries",
                "0",
                "cache must hold at least one entry",
            ));
        }

        if self.cache.ttl_secs == 0 {
            return Err(invalid("cache.ttl_secs", "0", "cache TTL must be positive"));
        }

        if self.providers.requests_per_minute == 0 {
            return Err(invalid(
                "providers.requests_per_minute",
                "0",
                "request budget must be positive",
            ));
        }

        let endpoints = [
            ("providers.routing", &self.providers.routing),
            ("providers.places", &self.providers.places),
            ("providers.weather", &self.providers.weather),
            ("providers.flight", &self.providers.flight),
        ];
        for (field, endpoint) in endpoints {
            if let Some(endpoint) = endpoint {
                let url = endpoint.base_url.as_str();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(invalid(field, url, "base_url must be an http(s) URL"));
                }
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> OutlineError {
    OutlineError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn override_endpoint(slot: &mut Option<ProviderEndpoint>, url_var: &str, key_var: Option<&str>) {
    if let Ok(url) = std::env::var(url_var) {
        let api_key = slot.as_ref().and_then(|e| e.api_key.clone());
        *slot = Some(ProviderEndpoint {
            base_url: url.trim().to_string(),
            api_key,
        });
    }
    if let (Some(var), Some(endpoint)) = (key_var, slot.as_mut()) {
        if let Ok(key) = std::env::var(var) {
            endpoint.api_key = Some(key);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.evaluation.resolution_timeout(), Duration::from_secs(5));
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_from_toml_partial_sections() {
        let config = EngineConfig::from_toml_str(
            r#"
            [suggestion]
            max_sibling_distance = 3

            [providers.routing]
            base_url = "https://router.project-osrm.org"
            "#,
        )
        .unwrap();

        assert_eq!(config.suggestion.max_sibling_distance, 3);
        assert_eq!(config.suggestion.max_ancestor_depth, 16);
        assert_eq!(
            config.providers.routing.as_ref().map(|e| e.base_url.as_str()),
            Some("https://router.project-osrm.org")
        );
        assert!(config.providers.weather.is_none());
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        let err = EngineConfig::from_toml_str("suggestion = [").unwrap_err();
        assert!(matches!(err, OutlineError::Config(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_cache() {
        let mut config = EngineConfig::default();
        config.cache.max_entries = 0;
        let err = config.validate().unwrap_err();
        assert!(format!("{}", err).contains("cache.max_entries"));
    }

    #[test]
    fn test_validate_rejects_non_http_endpoint() {
        let mut config = EngineConfig::default();
        config.providers.weather = Some(ProviderEndpoint {
            base_url: "ftp://weather".to_string(),
            api_key: None,
        });
        assert!(config.validate().is_err());
    }
}
