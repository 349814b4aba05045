//! Open-Meteo-compatible weather provider

use super::client::ProviderClient;
use super::invalid_response;
use crate::provider::{WeatherProvider, WeatherReport};
use async_trait::async_trait;
use chrono::NaiveDate;
use outline_core::{LatLng, OutlineResult, ProviderEndpoint};
use serde::Deserialize;

const DAILY_FIELDS: &str = "temperature_2m_min,temperature_2m_max,temperature_2m_mean,weather_code";

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: Daily,
    #[serde(default)]
    hourly: Option<Hourly>,
}

#[derive(Debug, Deserialize)]
struct Daily {
    time: Vec<String>,
    temperature_2m_min: Vec<Option<f64>>,
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_mean: Vec<Option<f64>>,
    weather_code: Vec<Option<u16>>,
}

#[derive(Debug, Deserialize)]
struct Hourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
}

/// Daily weather from an Open-Meteo `v1/forecast` endpoint.
pub struct OpenMeteoWeatherProvider {
    client: ProviderClient,
}

impl OpenMeteoWeatherProvider {
    /// # Arguments
    /// * `endpoint` - e.g. `https://api.open-meteo.com`
    /// * `requests_per_minute` - Request budget
    pub fn new(endpoint: &ProviderEndpoint, requests_per_minute: u32) -> Self {
        Self {
            client: ProviderClient::new("open-meteo", endpoint, requests_per_minute),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoWeatherProvider {
    async fn weather(&self, date: NaiveDate, location: LatLng) -> OutlineResult<WeatherReport> {
        let day = date.format("%Y-%m-%d").to_string();
        let query = [
            ("latitude", location.lat.to_string()),
            ("longitude", location.lng.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("hourly", "temperature_2m".to_string()),
            ("start_date", day.clone()),
            ("end_date", day),
            ("timezone", "UTC".to_string()),
        ];
        let response: ForecastResponse = self.client.get_json("v1/forecast", &query).await?;
        parse_forecast(response, date)
    }

    fn provider_id(&self) -> &str {
        "open-meteo"
    }
}

fn parse_forecast(response: ForecastResponse, date: NaiveDate) -> OutlineResult<WeatherReport> {
    let day = date.format("%Y-%m-%d").to_string();
    let daily = &response.daily;
    let index = daily
        .time
        .iter()
        .position(|t| *t == day)
        .ok_or_else(|| invalid_response("open-meteo", format!("No daily entry for {}", day)))?;

    let at = |series: &[Option<f64>]| series.get(index).copied().flatten();
    let (min_c, max_c) = match (at(&daily.temperature_2m_min), at(&daily.temperature_2m_max)) {
        (Some(min), Some(max)) => (min, max),
        _ => return Err(invalid_response("open-meteo", format!("Missing temperatures for {}", day))),
    };
    let mean_c = at(&daily.temperature_2m_mean).unwrap_or((min_c + max_c) / 2.0);
    let code = daily.weather_code.get(index).copied().flatten().unwrap_or(0);

    let hourly_c = response
        .hourly
        .map(|hourly| {
            hourly
                .time
                .iter()
                .zip(hourly.temperature_2m)
                .filter(|(time, _)| time.starts_with(&day))
                .filter_map(|(_, temp)| temp)
                .collect()
        })
        .unwrap_or_default();

    Ok(WeatherReport {
        date,
        min_c,
        max_c,
        mean_c,
        code,
        hourly_c,
    })
}

impl std::fmt::Debug for OpenMeteoWeatherProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenMeteoWeatherProvider")
            .field("client", &self.client)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 2).unwrap()
    }

    #[test]
    fn test_parse_forecast_picks_matching_day() {
        let response: ForecastResponse = serde_json::from_str(
            r#"{
                "daily": {
                    "time": ["2026-05-01", "2026-05-02"],
                    "temperature_2m_min": [5.0, 7.5],
                    "temperature_2m_max": [15.0, 18.5],
                    "temperature_2m_mean": [10.0, 13.0],
                    "weather_code": [1, 61]
                },
                "hourly": {
                    "time": ["2026-05-01T23:00", "2026-05-02T00:00", "2026-05-02T01:00"],
                    "temperature_2m": [9.0, 8.5, null]
                }
            }"#,
        )
        .unwrap();

        let report = parse_forecast(response, date()).unwrap();
        assert_eq!(report.min_c, 7.5);
        assert_eq!(report.max_c, 18.5);
        assert_eq!(report.mean_c, 13.0);
        assert_eq!(report.code, 61);
        assert_eq!(report.hourly_c, vec![8.5]);
    }

    #[test]
    fn test_parse_forecast_mean_fallback() {
        let response: ForecastResponse = serde_json::from_str(
            r#"{"daily": {
                "time": ["2026-05-02"],
                "temperature_2m_min": [10.0],
                "temperature_2m_max": [20.0],
                "weather_code": [null]
            }}"#,
        )
        .unwrap();

        let report = parse_forecast(response, date()).unwrap();
        assert_eq!(report.mean_c, 15.0);
        assert_eq!(report.code, 0);
        assert!(report.hourly_c.is_empty());
    }

    #[test]
    fn test_parse_forecast_missing_day() {
        let response: ForecastResponse = serde_json::from_str(
            r#"{"daily": {"time": [], "temperature_2m_min": [], "temperature_2m_max": [], "weather_code": []}}"#,
        )
        .unwrap();
        assert!(parse_forecast(response, date()).is_err());
    }
}
