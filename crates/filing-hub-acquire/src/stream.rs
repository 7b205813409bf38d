use futures::StreamExt;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use filing_hub_core::error::AppResult;
use filing_hub_core::logging::LOG_PROCESS;

/// Streams an HTTP response body to disk chunk by chunk.
///
/// The destination file handle is scoped to `stream_to_file`: flush and
/// close happen on every exit path, including errors and cancellation.
pub struct StreamHandler {
    chunk_size: usize,
    pub bytes_written: u64,
    pub chunks_written: u64,
}

impl StreamHandler {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            bytes_written: 0,
            chunks_written: 0,
        }
    }

    /// Write the response stream to `output_path`.
    ///
    /// With `resume_from > 0` the file is opened in append mode and counters
    /// start at the resume offset.
    pub async fn stream_to_file(
        &mut self,
        response: reqwest::Response,
        output_path: &Path,
        total_size: Option<u64>,
        resume_from: u64,
    ) -> AppResult<u64> {
        info!("{} Streaming to: {}", LOG_PROCESS, output_path.display());

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(resume_from > 0)
            .truncate(resume_from == 0)
            .open(output_path)
            .await?;

        let mut writer = BufWriter::with_capacity(self.chunk_size, file);

        self.bytes_written = resume_from;
        self.chunks_written = 0;

        let mut stream = response.bytes_stream();

        let write_result: AppResult<()> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(filing_hub_core::AppError::from)?;
                if chunk.is_empty() {
                    continue;
                }

                writer.write_all(&chunk).await?;
                self.bytes_written += chunk.len() as u64;
                self.chunks_written += 1;

                if self.chunks_written % 100 == 0 {
                    if let Some(total) = total_size {
                        let progress = (self.bytes_written as f64 / total as f64) * 100.0;
                        debug!(
                            "{} Progress: {:.1}% ({}/{} bytes)",
                            LOG_PROCESS, progress, self.bytes_written, total
                        );
                    } else {
                        debug!("{} Downloaded: {} bytes", LOG_PROCESS, self.bytes_written);
                    }
                }
            }
            Ok(())
        }
        .await;

        // Flush whatever was written even when the stream errored so the
        // partial file supports resume
        let flush_result = writer.flush().await;
        write_result?;
        flush_result?;

        info!(
            "{} Stream complete: {} bytes in {} chunks",
            LOG_PROCESS, self.bytes_written, self.chunks_written
        );

        Ok(self.bytes_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_to_file() {
        // REQUIREMENT: Downloads stream to disk without buffering the body
        // PURPOSE: Verify bytes and chunk accounting against a mock server
        let mut server = mockito::Server::new_async().await;
        let body = vec![0xABu8; 64 * 1024];
        server
            .mock("GET", "/artifact.zip")
            .with_status(200)
            .with_body(body.clone())
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("artifact.zip");

        let response = reqwest::get(format!("{}/artifact.zip", server.url()))
            .await
            .unwrap();

        let mut handler = StreamHandler::new(8192);
        let written = handler
            .stream_to_file(response, &output, Some(body.len() as u64), 0)
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert!(handler.chunks_written >= 1);
        assert_eq!(std::fs::read(&output).unwrap(), body);
    }

    #[tokio::test]
    async fn test_stream_resume_appends() {
        // REQUIREMENT: Resume continues a partial file instead of restarting
        // PURPOSE: Verify append mode and the resume offset accounting
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest")
            .with_status(206)
            .with_body("WORLD")
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("partial.bin");
        std::fs::write(&output, "HELLO ").unwrap();

        let response = reqwest::get(format!("{}/rest", server.url())).await.unwrap();

        let mut handler = StreamHandler::new(8192);
        let written = handler.stream_to_file(response, &output, None, 6).await.unwrap();

        assert_eq!(written, 11);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "HELLO WORLD");
    }
}
