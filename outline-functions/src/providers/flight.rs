//! JSON flight status provider

use super::client::ProviderClient;
use super::places::encode_segment;
use crate::provider::{FlightProvider, FlightStatus};
use async_trait::async_trait;
use chrono::NaiveDate;
use outline_core::{OutlineResult, ProviderEndpoint};

/// Flight status from a JSON service answering
/// `GET flights/{number}?date=YYYY-MM-DD` with a [`FlightStatus`] body.
pub struct JsonFlightProvider {
    client: ProviderClient,
}

impl JsonFlightProvider {
    pub fn new(endpoint: &ProviderEndpoint, requests_per_minute: u32) -> Self {
        Self {
            client: ProviderClient::new("flight", endpoint, requests_per_minute),
        }
    }
}

#[async_trait]
impl FlightProvider for JsonFlightProvider {
    async fn flight(&self, number: &str, date: Option<NaiveDate>) -> OutlineResult<FlightStatus> {
        let path = format!("flights/{}", encode_segment(number));
        let query: Vec<(&str, String)> = date
            .map(|d| ("date", d.format("%Y-%m-%d").to_string()))
            .into_iter()
            .collect();
        self.client.get_json(&path, &query).await
    }

    fn provider_id(&self) -> &str {
        "flight"
    }
}

impl std::fmt::Debug for JsonFlightProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFlightProvider")
            .field("client", &self.client)
            .finish()
    }
}
