use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use filing_hub_core::error::{AppError, AppResult};

use crate::rate_limit::SlidingWindowLimiter;

/// Companies House REST client.
///
/// Authenticates with HTTP Basic (API key as username, empty password) and
/// enforces the 600 requests / 5 minutes quota through a shared sliding
/// window.
pub struct UkApiClient {
    client: Client,
    api_key: String,
    limiter: SlidingWindowLimiter,
}

impl UkApiClient {
    pub fn new(api_key: &str, user_agent: &str, timeout: Duration) -> AppResult<Self> {
        if api_key.is_empty() {
            return Err(AppError::ConfigError(
                "UK Companies House API key not configured".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| AppError::ConfigError(format!("Invalid UK user agent: {}", e)))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            limiter: SlidingWindowLimiter::companies_house(),
        })
    }

    /// GET a JSON document. 404 reads as absence; 401 is a configuration
    /// error worth failing loudly on.
    pub async fn get_json(&self, url: &str) -> AppResult<Option<serde_json::Value>> {
        self.limiter.wait_for_permit().await;

        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .basic_auth(&self.api_key, Some(""))
            .send()
            .await?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            reqwest::StatusCode::UNAUTHORIZED => Err(AppError::ConfigError(
                "Companies House API key rejected".to_string(),
            )),
            reqwest::StatusCode::TOO_MANY_REQUESTS => {
                warn!("Companies House rate limit hit server-side");
                Err(AppError::RateLimitExceeded)
            }
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(AppError::ExternalApiError(format!(
                "HTTP {} for {}",
                status, url
            ))),
        }
    }
}
