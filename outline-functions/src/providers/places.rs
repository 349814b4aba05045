//! JSON places provider

use super::client::ProviderClient;
use crate::provider::{Place, PlacesProvider};
use async_trait::async_trait;
use outline_core::{OutlineResult, ProviderEndpoint};

/// Places from a JSON service answering `GET places/{id}` with a
/// [`Place`] body.
pub struct JsonPlacesProvider {
    client: ProviderClient,
}

impl JsonPlacesProvider {
    pub fn new(endpoint: &ProviderEndpoint, requests_per_minute: u32) -> Self {
        Self {
            client: ProviderClient::new("places", endpoint, requests_per_minute),
        }
    }
}

#[async_trait]
impl PlacesProvider for JsonPlacesProvider {
    async fn place(&self, place_id: &str) -> OutlineResult<Place> {
        let path = format!("places/{}", encode_segment(place_id));
        self.client.get_json(&path, &[]).await
    }

    fn provider_id(&self) -> &str {
        "places"
    }
}

/// Percent-encode everything outside the unreserved URL set.
pub(crate) fn encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }
    encoded
}

impl std::fmt::Debug for JsonPlacesProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonPlacesProvider")
            .field("client", &self.client)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outline_core::LatLng;

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("ChIJ-abc_1.2~"), "ChIJ-abc_1.2~");
        assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
    }

    #[test]
    fn test_place_body_decodes() {
        let place: Place = serde_json::from_str(
            r#"{"id": "p1", "name": "Old Harbour", "location": {"lat": 53.55, "lng": 9.99}}"#,
        )
        .unwrap();
        assert_eq!(place.name, "Old Harbour");
        assert_eq!(place.address, None);
        assert_eq!(place.location, LatLng::new(53.55, 9.99));
    }
}
