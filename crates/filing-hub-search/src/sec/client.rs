use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use filing_hub_core::error::{AppError, AppResult};

use crate::rate_limit::RateLimiter;

/// Rate-limited HTTP client for SEC EDGAR.
///
/// Every request carries the SEC-required contact User-Agent and passes
/// through the shared per-second limiter.
pub struct SecApiClient {
    client: Client,
    rate_limiter: RateLimiter,
}

impl SecApiClient {
    pub fn new(user_agent: &str, timeout: Duration) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| AppError::ConfigError(format!("Invalid SEC user agent: {}", e)))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::sec_edgar(),
        })
    }

    /// Fetch and deserialize a JSON document
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> AppResult<T> {
        self.rate_limiter.wait_for_permit().await;

        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }

        Ok(response.json::<T>().await?)
    }

    /// Fetch a JSON document, treating 404 as absence rather than an error.
    /// Older filings have no index.json; the caller falls back to probing.
    pub async fn get_json_optional(&self, url: &str) -> AppResult<Option<serde_json::Value>> {
        self.rate_limiter.wait_for_permit().await;

        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            warn!("HTTP {} for {}", response.status(), url);
            return Ok(None);
        }

        // Some filing directories serve HTML where index.json is expected
        match response.json::<serde_json::Value>().await {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!("Index document is not JSON ({}), falling back", e);
                Ok(None)
            }
        }
    }

    /// HEAD probe: does this URL resolve?
    pub async fn check_url_exists(&self, url: &str) -> bool {
        self.rate_limiter.wait_for_permit().await;

        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("HEAD failed for {}: {}", url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_json_optional_handles_missing_index() {
        // REQUIREMENT: Filings without index.json fall back to pattern probing
        // PURPOSE: Verify 404 and HTML responses both read as "no index"
        let mut server = mockito::Server::new_async().await;

        let missing = server
            .mock("GET", "/missing/index.json")
            .with_status(404)
            .create_async()
            .await;
        let html = server
            .mock("GET", "/html/index.json")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body>listing</body></html>")
            .create_async()
            .await;

        let client = SecApiClient::new("Test test@example.com", Duration::from_secs(5)).unwrap();

        let result = client
            .get_json_optional(&format!("{}/missing/index.json", server.url()))
            .await
            .unwrap();
        assert!(result.is_none());

        let result = client
            .get_json_optional(&format!("{}/html/index.json", server.url()))
            .await
            .unwrap();
        assert!(result.is_none());

        missing.assert_async().await;
        html.assert_async().await;
    }

    #[tokio::test]
    async fn test_check_url_exists() {
        // REQUIREMENT: Candidate archive URLs are validated with HEAD requests
        // PURPOSE: Verify the probe distinguishes present from absent files
        let mut server = mockito::Server::new_async().await;

        server
            .mock("HEAD", "/real-xbrl.zip")
            .with_status(200)
            .create_async()
            .await;
        server
            .mock("HEAD", "/gone-xbrl.zip")
            .with_status(404)
            .create_async()
            .await;

        let client = SecApiClient::new("Test test@example.com", Duration::from_secs(5)).unwrap();

        assert!(client.check_url_exists(&format!("{}/real-xbrl.zip", server.url())).await);
        assert!(!client.check_url_exists(&format!("{}/gone-xbrl.zip", server.url())).await);
    }
}
