use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use filing_hub_core::error::{AppError, AppResult};

/// JSON-API client for filings.xbrl.org.
pub struct EsefApiClient {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl EsefApiClient {
    pub fn new(timeout: Duration, max_retries: u32, retry_delay: Duration) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.api+json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            max_retries,
            retry_delay,
        })
    }

    /// GET a JSON-API document with simple backoff on transient failures
    pub async fn get_json(&self, url: &str) -> AppResult<Option<serde_json::Value>> {
        let mut last_error: Option<AppError> = None;

        for attempt in 0..self.max_retries {
            debug!("GET {} (attempt {})", url, attempt + 1);

            match self.client.get(url).send().await {
                Ok(response) => match response.status() {
                    reqwest::StatusCode::NOT_FOUND => return Ok(None),
                    reqwest::StatusCode::TOO_MANY_REQUESTS => {
                        let wait = response
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(60);
                        warn!("Aggregator rate limited, waiting {}s", wait);
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                        last_error = Some(AppError::RateLimitExceeded);
                        continue;
                    }
                    status if status.is_success() => {
                        return Ok(Some(response.json().await?));
                    }
                    status => {
                        last_error =
                            Some(AppError::ExternalApiError(format!("HTTP {}", status)));
                    }
                },
                Err(e) => {
                    warn!("Request error: {} (attempt {})", e, attempt + 1);
                    last_error = Some(e.into());
                }
            }

            if attempt + 1 < self.max_retries {
                let backoff = self.retry_delay * 2u32.pow(attempt);
                tokio::time::sleep(backoff).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::ExternalApiError("Aggregator request failed".to_string())
        }))
    }
}
