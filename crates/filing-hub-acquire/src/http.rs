use reqwest::Client;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{error, info};

use filing_hub_core::error::{AppError, AppResult};
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};
use filing_hub_core::Config;

use crate::headers::apply_market_headers;
use crate::result::DownloadResult;
use crate::retry::{RetryClass, RetryManager};
use crate::stream::StreamHandler;

/// Metadata from a HEAD probe
#[derive(Debug, Clone)]
pub struct HeadInfo {
    pub status: u16,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub supports_resume: bool,
}

/// Streaming HTTP download engine with per-market headers and retry.
pub struct HttpHandler {
    client: Client,
    config: Config,
    retry_manager: RetryManager,
}

impl HttpHandler {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http.read_timeout_seconds))
            .connect_timeout(Duration::from_secs(config.http.connect_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            retry_manager: RetryManager::from_config(&config.retry),
            config: config.clone(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Download a URL to `output_path`, retrying transient failures.
    ///
    /// Never propagates an error: failures land in the returned
    /// `DownloadResult` for the caller to attribute.
    pub async fn download(&self, url: &str, output_path: &Path, resume: bool) -> DownloadResult {
        info!("{} Downloading: {}", LOG_INPUT, url);
        info!("{} Output: {}", LOG_INPUT, output_path.display());

        let start = Instant::now();

        let outcome = self
            .retry_manager
            .retry_async(
                || self.download_once(url, output_path, resume),
                |err| match err {
                    DownloadAttemptError::Status(status) => RetryManager::classify_status(*status),
                    DownloadAttemptError::Transport(class) => *class,
                    DownloadAttemptError::Filesystem => RetryClass::Fatal,
                },
            )
            .await;

        let mut result = DownloadResult::new(url, output_path);
        result.duration = start.elapsed();

        match outcome {
            Ok((bytes, chunks, status)) => {
                result.success = true;
                result.file_size = bytes;
                result.chunks_downloaded = chunks;
                result.status_code = Some(status);

                info!(
                    "{} Download complete: {} bytes in {:.2}s ({:.2} MB/s)",
                    LOG_OUTPUT,
                    bytes,
                    result.duration.as_secs_f64(),
                    result.download_speed_mbps()
                );
            }
            Err(err) => {
                result.error_message = Some(err.to_string());
                if let DownloadAttemptError::Status(status) = err {
                    result.status_code = Some(status);
                }
                error!("{} Download failed: {}", LOG_OUTPUT, err);
            }
        }

        result
    }

    async fn download_once(
        &self,
        url: &str,
        output_path: &Path,
        resume: bool,
    ) -> Result<(u64, u64, u16), DownloadAttemptError> {
        // Resume from whatever is already on disk
        let resume_from = if resume && self.config.acquisition.enable_resume {
            match tokio::fs::metadata(output_path).await {
                Ok(meta) => meta.len(),
                Err(_) => 0,
            }
        } else {
            0
        };

        let mut builder = self.client.get(url);
        builder = apply_market_headers(builder, url, &self.config.credentials);

        if resume_from > 0 {
            info!("{} Resuming from byte {}", LOG_PROCESS, resume_from);
            builder = builder.header(reqwest::header::RANGE, format!("bytes={}-", resume_from));
        }

        let response = builder.send().await.map_err(|e| {
            DownloadAttemptError::Transport(RetryManager::classify_transport_error(&e))
        })?;

        let status = response.status().as_u16();
        if status != 200 && status != 206 {
            return Err(DownloadAttemptError::Status(status));
        }

        // A 200 to a ranged request restarts the body from scratch
        let effective_resume = if status == 206 { resume_from } else { 0 };
        let total_size = response.content_length().map(|len| len + effective_resume);

        let mut stream_handler = StreamHandler::new(self.config.acquisition.chunk_size);
        let bytes = stream_handler
            .stream_to_file(response, output_path, total_size, effective_resume)
            .await
            .map_err(|e| match e {
                AppError::Io(_) => DownloadAttemptError::Filesystem,
                _ => DownloadAttemptError::Transport(RetryClass::Retryable),
            })?;

        Ok((bytes, stream_handler.chunks_written, status))
    }

    /// HEAD probe with market headers, following redirects.
    /// Returns `None` when the request itself fails.
    pub async fn head_request(&self, url: &str) -> Option<HeadInfo> {
        let builder = self.client.head(url);
        let builder = apply_market_headers(builder, url, &self.config.credentials);

        match builder.send().await {
            Ok(response) => Some(HeadInfo {
                status: response.status().as_u16(),
                content_type: response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_lowercase(),
                content_length: response.content_length(),
                supports_resume: response
                    .headers()
                    .contains_key(reqwest::header::ACCEPT_RANGES),
            }),
            Err(e) => {
                tracing::debug!("HEAD request failed for {}: {}", url, e);
                None
            }
        }
    }

    /// GET a body into memory with market headers. Used for small documents
    /// (schemas, directory listings), never for filing archives.
    pub async fn get_bytes(&self, url: &str) -> AppResult<(u16, String, Vec<u8>)> {
        let builder = self.client.get(url);
        let builder = apply_market_headers(builder, url, &self.config.credentials);

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        let body = response.bytes().await?.to_vec();

        Ok((status, content_type, body))
    }

    /// GET with an explicit Accept header, for content negotiation
    pub async fn get_bytes_with_accept(
        &self,
        url: &str,
        accept: &str,
    ) -> AppResult<(u16, String, Vec<u8>)> {
        let builder = crate::headers::apply_market_headers_with_accept(
            self.client.get(url),
            url,
            &self.config.credentials,
            Some(accept),
        );

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        let body = response.bytes().await?.to_vec();

        Ok((status, content_type, body))
    }
}

/// Failure modes of one download attempt
#[derive(Debug, Clone, Copy)]
enum DownloadAttemptError {
    Status(u16),
    Transport(RetryClass),
    Filesystem,
}

impl std::fmt::Display for DownloadAttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadAttemptError::Status(status) => write!(f, "HTTP {}", status),
            DownloadAttemptError::Transport(_) => write!(f, "network error"),
            DownloadAttemptError::Filesystem => write!(f, "filesystem write error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::from_env().unwrap();
        config.retry.retry_delay_seconds = 0;
        config.retry.max_retry_delay_seconds = 0;
        config
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_download_success() {
        // REQUIREMENT: Downloads stream to the target path
        // PURPOSE: Verify the success path fills in the result record
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/file.zip")
            .with_status(200)
            .with_body("zip-bytes")
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("file.zip");

        let handler = HttpHandler::new(&test_config()).unwrap();
        let result = handler
            .download(&format!("{}/file.zip", server.url()), &output, false)
            .await;

        assert!(result.success);
        assert_eq!(result.file_size, 9);
        assert_eq!(result.status_code, Some(200));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "zip-bytes");
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_download_fatal_404_no_retry() {
        // REQUIREMENT: 4xx other than 408/429 is fatal
        // PURPOSE: Verify a 404 is reported once without retries
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/gone.zip")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("gone.zip");

        let handler = HttpHandler::new(&test_config()).unwrap();
        let result = handler
            .download(&format!("{}/gone.zip", server.url()), &output, false)
            .await;

        assert!(!result.success);
        assert_eq!(result.status_code, Some(404));
        assert_eq!(result.error_message.as_deref(), Some("HTTP 404"));
        mock.assert_async().await;
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_download_retries_on_503() {
        // REQUIREMENT: 5xx responses are retried with backoff
        // PURPOSE: Verify the retry budget is actually spent on 503s
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky.zip")
            .with_status(503)
            .expect(4) // initial attempt + 3 retries
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("flaky.zip");

        let handler = HttpHandler::new(&test_config()).unwrap();
        let result = handler
            .download(&format!("{}/flaky.zip", server.url()), &output, false)
            .await;

        assert!(!result.success);
        assert_eq!(result.status_code, Some(503));
        mock.assert_async().await;
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_head_request() {
        // REQUIREMENT: Detection uses HEAD metadata
        // PURPOSE: Verify status and content-type surface from the probe
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/check.zip")
            .with_status(200)
            .with_header("content-type", "application/zip")
            .create_async()
            .await;

        let handler = HttpHandler::new(&test_config()).unwrap();
        let info = handler
            .head_request(&format!("{}/check.zip", server.url()))
            .await
            .unwrap();

        assert_eq!(info.status, 200);
        assert_eq!(info.content_type, "application/zip");
    }
}
