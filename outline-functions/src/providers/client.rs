//! Shared HTTP client with rate limiting

use super::{invalid_response, rate_limited, request_failed};
use outline_core::{OutlineResult, ProviderEndpoint};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Longest `retry-after` the client will wait out before giving up.
const MAX_RETRY_WAIT_MS: u64 = 5_000;

/// JSON-over-HTTP client for one provider, with rate limiting.
pub struct ProviderClient {
    client: Client,
    provider: String,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: Arc<Semaphore>,
    /// Milliseconds since `start_time` of the last request, plus one; zero
    /// means no request yet.
    last_request: Arc<AtomicU64>,
    min_request_interval_ms: u64,
    start_time: Instant,
    max_retries: u32,
}

impl ProviderClient {
    /// Create a new provider client.
    ///
    /// # Arguments
    /// * `provider` - Name used in errors and logs
    /// * `endpoint` - Base URL and optional API key
    /// * `requests_per_minute` - Maximum requests per minute
    pub fn new(provider: impl Into<String>, endpoint: &ProviderEndpoint, requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        let permits = rpm as usize;
        let min_interval_ms = (60_000 / rpm as u64).max(10);

        Self {
            client: Client::new(),
            provider: provider.into(),
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
            rate_limiter: Arc::new(Semaphore::new(permits)),
            last_request: Arc::new(AtomicU64::new(0)),
            min_request_interval_ms: min_interval_ms,
            start_time: Instant::now(),
            max_retries: 1,
        }
    }

    /// Number of times a rate-limited request is retried after waiting.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `base_url/path` with query parameters and decode a JSON body.
    pub async fn get_json<Res: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> OutlineResult<Res> {
        let mut attempt = 0;
        loop {
            match self.get_once(path, query).await {
                Err(RequestOutcome::RateLimited(retry_after_ms))
                    if attempt < self.max_retries && retry_after_ms <= MAX_RETRY_WAIT_MS =>
                {
                    attempt += 1;
                    tracing::warn!(
                        provider = %self.provider,
                        retry_after_ms,
                        attempt,
                        "Rate limited, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(retry_after_ms)).await;
                }
                Err(RequestOutcome::RateLimited(retry_after_ms)) => {
                    return Err(rate_limited(&self.provider, retry_after_ms));
                }
                Err(RequestOutcome::Failed(e)) => return Err(e),
                Ok(bytes) => {
                    return serde_json::from_slice(&bytes).map_err(|e| {
                        invalid_response(&self.provider, format!("Failed to parse response: {}", e))
                    });
                }
            }
        }
    }

    async fn get_once(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<u8>, RequestOutcome> {
        // Rate limiting: acquire permit
        let _permit = self.rate_limiter.acquire().await.map_err(|e| {
            RequestOutcome::Failed(request_failed(
                &self.provider,
                0,
                format!("Rate limiter error: {}", e),
            ))
        })?;

        self.wait_for_interval().await;

        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self.client.get(&url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| {
            RequestOutcome::Failed(request_failed(
                &self.provider,
                0,
                format!("HTTP request failed: {}", e),
            ))
        })?;

        let status = response.status();
        let retry_after_ms = parse_retry_after_ms(response.headers()).unwrap_or(0);

        if status.is_success() {
            let bytes = response.bytes().await.map_err(|e| {
                RequestOutcome::Failed(invalid_response(
                    &self.provider,
                    format!("Failed to read response: {}", e),
                ))
            })?;
            return Ok(bytes.to_vec());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::warn!(provider = %self.provider, status = status.as_u16(), "Provider request failed");

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => RequestOutcome::RateLimited(retry_after_ms),
            _ => RequestOutcome::Failed(request_failed(&self.provider, status.as_u16(), error_text)),
        })
    }

    /// Enforce minimum interval between requests.
    async fn wait_for_interval(&self) {
        let now_ms = self.start_time.elapsed().as_millis() as u64;
        let last = self.last_request.load(Ordering::Relaxed);
        if last > 0 {
            let elapsed = now_ms.saturating_sub(last - 1);
            if elapsed < self.min_request_interval_ms {
                let wait_ms = self.min_request_interval_ms - elapsed;
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            }
        }
        let sent_ms = self.start_time.elapsed().as_millis() as u64;
        self.last_request.store(sent_ms + 1, Ordering::Relaxed);
    }
}

enum RequestOutcome {
    RateLimited(u64),
    Failed(outline_core::OutlineError),
}

/// `retry-after` in seconds (fractional allowed) converted to milliseconds.
pub(crate) fn parse_retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .map(|seconds| (seconds * 1000.0) as u64)
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
