use std::path::Path;
use tracing::{error, info, warn};

use filing_hub_core::logging::{LOG_OUTPUT, LOG_PROCESS};
use filing_hub_core::Config;

use crate::archive::ArchiveHandler;
use crate::detector::{DistributionDetector, DistributionType};
use crate::directory::DirectoryHandler;
use crate::http::HttpHandler;
use crate::result::{ErrorStage, ExtractionResult, ProcessingResult};
use crate::temp;
use crate::xsd::XsdHandler;

/// Routes a single URL+target to the handler selected by the detector.
pub struct DistributionProcessor {
    config: Config,
}

impl DistributionProcessor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Download and extract `url` into `target_dir`, whatever its packaging.
    pub async fn download_and_extract(
        &self,
        http: &HttpHandler,
        url: &str,
        target_dir: &Path,
    ) -> ProcessingResult {
        info!("{} Starting distribution-agnostic download", LOG_PROCESS);

        let detector = DistributionDetector::new(http);
        let detection = detector.detect(url).await;

        if !detection.exists {
            let actual_error = detection
                .error
                .clone()
                .or_else(|| detection.status.map(|s| format!("HTTP {}", s)))
                .unwrap_or_else(|| "URL not accessible".to_string());

            let message = format!("URL not found: {} - {}", url, actual_error);
            error!("{} URL not accessible: {}", LOG_OUTPUT, actual_error);
            return ProcessingResult::failed_at(ErrorStage::Detection, message);
        }

        let working_url = detection.url.clone();
        info!("{} Detected type: {}", LOG_OUTPUT, detection.dist_type);
        info!("{} Working URL: {}", LOG_OUTPUT, working_url);

        match detection.dist_type {
            DistributionType::Archive => self.handle_archive(http, &working_url, target_dir).await,
            DistributionType::Ixbrl => self.handle_ixbrl(http, &working_url, target_dir).await,
            DistributionType::Xsd => self.handle_xsd(http, &working_url, target_dir).await,
            DistributionType::Directory => {
                self.handle_directory(http, &working_url, target_dir).await
            }
            DistributionType::Unknown => {
                // Last resort: treat as a single document
                warn!("Unknown distribution type, trying single file download");
                self.handle_ixbrl(http, &working_url, target_dir).await
            }
        }
    }

    /// Archive: download to temp, extract into the target, drop the temp
    /// file on success.
    async fn handle_archive(
        &self,
        http: &HttpHandler,
        url: &str,
        target_dir: &Path,
    ) -> ProcessingResult {
        info!("{} Handling as archive", LOG_PROCESS);

        let mut result = ProcessingResult::default();

        let temp_path = temp::unique_temp_path(&self.config.paths.temp_dir, url);
        if let Err(e) = tokio::fs::create_dir_all(&self.config.paths.temp_dir).await {
            return ProcessingResult::failed_at(
                ErrorStage::Download,
                format!("Cannot create temp directory: {}", e),
            );
        }

        let download = http
            .download(url, &temp_path, self.config.acquisition.enable_resume)
            .await;
        if !download.success {
            result.error_stage = Some(ErrorStage::Download);
            result.download_result = Some(download);
            return result;
        }
        result.download_result = Some(download);

        // Extraction is CPU-bound; run it off the async workers
        let handler = ArchiveHandler::new(self.config.safety.clone());
        let target = target_dir.to_path_buf();
        let archive_path = temp_path.clone();

        let extraction = tokio::task::spawn_blocking(move || {
            handler.extract(&archive_path, &target, true)
        })
        .await
        .unwrap_or_else(|e| ExtractionResult::failed(format!("Extraction task failed: {}", e)));

        if !extraction.success {
            result.error_stage = Some(ErrorStage::Extraction);
            result.extraction_result = Some(extraction);
            return result;
        }

        result.extraction_result = Some(extraction);
        result.success = true;
        result
    }

    /// iXBRL: download to temp, then move into the target. No extraction.
    ///
    /// Companies House documents negotiate their format through the accept
    /// ladder (xhtml -> html -> pdf) instead of a plain streamed download; a
    /// PDF that resolves is recorded but never reclassified as parseable.
    async fn handle_ixbrl(
        &self,
        http: &HttpHandler,
        url: &str,
        target_dir: &Path,
    ) -> ProcessingResult {
        info!("{} Handling as iXBRL single file", LOG_PROCESS);

        let mut result = ProcessingResult::default();

        if let Err(e) = tokio::fs::create_dir_all(target_dir).await {
            return ProcessingResult::failed_at(
                ErrorStage::IxbrlDownload,
                format!("Cannot create target directory: {}", e),
            );
        }

        if crate::headers::is_companies_house_url(url) {
            let Some((body, content_type)) =
                crate::xsd::fetch_with_format_ladder(http, url).await
            else {
                result.error_stage = Some(ErrorStage::Download);
                result.error_message =
                    Some("All Companies House format attempts failed".to_string());
                return result;
            };

            let target_path = target_dir.join(crate::xsd::derive_filename(url, &content_type));
            if let Err(e) = tokio::fs::write(&target_path, &body).await {
                result.error_stage = Some(ErrorStage::IxbrlDownload);
                result.error_message = Some(format!("Cannot write document: {}", e));
                return result;
            }

            result.extraction_result = Some(ExtractionResult::succeeded(target_dir, 1));
            result.success = true;

            info!(
                "{} iXBRL download complete: {}",
                LOG_OUTPUT,
                target_path.display()
            );
            return result;
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.config.paths.temp_dir).await {
            return ProcessingResult::failed_at(
                ErrorStage::IxbrlDownload,
                format!("Cannot create temp directory: {}", e),
            );
        }

        let temp_path = temp::unique_temp_path(&self.config.paths.temp_dir, url);

        let download = http.download(url, &temp_path, false).await;
        if !download.success {
            result.error_stage = Some(ErrorStage::Download);
            result.download_result = Some(download);
            return result;
        }

        let filename = document_filename(&temp_path);
        let target_path = target_dir.join(filename);

        if let Err(e) = move_file(&temp_path, &target_path).await {
            result.download_result = Some(download);
            result.error_stage = Some(ErrorStage::IxbrlDownload);
            result.error_message = Some(format!("Cannot move document into place: {}", e));
            return result;
        }

        result.download_result = Some(download);
        result.extraction_result = Some(ExtractionResult::succeeded(target_dir, 1));
        result.success = true;

        info!(
            "{} iXBRL download complete: {}",
            LOG_OUTPUT,
            target_path.display()
        );
        result
    }

    /// XSD: the handler writes the dependency closure straight into the target
    async fn handle_xsd(
        &self,
        http: &HttpHandler,
        url: &str,
        target_dir: &Path,
    ) -> ProcessingResult {
        info!("{} Handling as XSD schema", LOG_PROCESS);

        let handler = XsdHandler::new(http);

        match handler.download_schema(url, target_dir).await {
            Ok(outcome) if outcome.success => {
                info!(
                    "{} XSD download complete: {} files",
                    LOG_OUTPUT, outcome.files_downloaded
                );
                ProcessingResult {
                    success: true,
                    extraction_result: Some(ExtractionResult::succeeded(
                        target_dir,
                        outcome.files_downloaded,
                    )),
                    ..Default::default()
                }
            }
            Ok(_) => {
                error!("XSD download failed");
                ProcessingResult::failed_at(ErrorStage::XsdDownload, "XSD download failed")
            }
            Err(e) => {
                error!("XSD download error: {}", e);
                ProcessingResult::failed_at(ErrorStage::XsdDownload, e.to_string())
            }
        }
    }

    /// Directory: mirror the remote listing into the target
    async fn handle_directory(
        &self,
        http: &HttpHandler,
        url: &str,
        target_dir: &Path,
    ) -> ProcessingResult {
        info!("{} Handling as directory structure", LOG_PROCESS);

        let handler = DirectoryHandler::new(http);

        match handler.mirror_directory(url, target_dir).await {
            Ok(outcome) if outcome.success => {
                info!(
                    "{} Directory mirror complete: {} files",
                    LOG_OUTPUT, outcome.files_downloaded
                );
                ProcessingResult {
                    success: true,
                    extraction_result: Some(ExtractionResult::succeeded(
                        target_dir,
                        outcome.files_downloaded,
                    )),
                    ..Default::default()
                }
            }
            Ok(_) => {
                error!("Directory mirror failed");
                ProcessingResult::failed_at(ErrorStage::DirectoryMirror, "Directory mirror failed")
            }
            Err(e) => {
                error!("Directory mirror error: {}", e);
                ProcessingResult::failed_at(ErrorStage::DirectoryMirror, e.to_string())
            }
        }
    }
}

/// Name for a moved single document: the downloaded filename minus the uuid
/// prefix. Companies House `/content` URLs carry no filename and become
/// `accounts.xhtml`, matching the negotiated iXBRL format.
fn document_filename(temp_path: &Path) -> String {
    let temp_name = temp_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");

    // unique_temp_path formats as {uuid}_{filename}
    let original = temp_name.splitn(2, '_').nth(1).unwrap_or(temp_name);

    if original == "content" || original.is_empty() {
        "accounts.xhtml".to_string()
    } else {
        original.to_string()
    }
}

async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(_) => {
            // Cross-device move: copy then remove
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filing_hub_core::Config;

    fn test_config(tmp: &tempfile::TempDir) -> Config {
        let mut config = Config::from_env().unwrap();
        config.paths.temp_dir = tmp.path().join("temp");
        config.retry.retry_delay_seconds = 0;
        config.retry.max_retry_delay_seconds = 0;
        config
    }

    #[test]
    fn test_document_filename() {
        // REQUIREMENT: Moved documents keep their name; /content gets a real one
        // PURPOSE: Verify the uuid prefix strip and the CH fallback
        let path = Path::new("/tmp/7f9c3c1e-aaaa-bbbb-cccc-000000000000_report.xhtml");
        assert_eq!(document_filename(path), "report.xhtml");

        let path = Path::new("/tmp/7f9c3c1e-aaaa-bbbb-cccc-000000000000_content");
        assert_eq!(document_filename(path), "accounts.xhtml");
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_archive_roundtrip() {
        // REQUIREMENT: archive -> temp download -> extract -> temp removed
        // PURPOSE: Verify the full archive route against a mock server
        use std::io::Write;

        // Build a small zip in memory
        let mut zip_bytes = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut zip_bytes));
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("instance.xhtml", options).unwrap();
            writer.write_all(b"<html/>").unwrap();
            writer.finish().unwrap();
        }

        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/filing-xbrl.zip")
            .with_status(200)
            .with_header("content-type", "application/zip")
            .create_async()
            .await;
        server
            .mock("GET", "/filing-xbrl.zip")
            .with_status(200)
            .with_body(zip_bytes)
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(&tmp);
        let http = HttpHandler::new(&config).unwrap();
        let processor = DistributionProcessor::new(config.clone());

        let target = tmp.path().join("out");
        let result = processor
            .download_and_extract(&http, &format!("{}/filing-xbrl.zip", server.url()), &target)
            .await;

        assert!(result.success, "{:?}", result.error_message);
        assert!(target.join("instance.xhtml").is_file());
        assert_eq!(result.extraction_result.unwrap().files_extracted, 1);
        // Temp file consumed by extraction cleanup
        assert_eq!(
            std::fs::read_dir(&config.paths.temp_dir).unwrap().count(),
            0
        );
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_detection_failure_reports_stage() {
        // REQUIREMENT: Unreachable URLs fail with error_stage = detection
        //              and a composed message including the HTTP status
        // PURPOSE: Verify failure attribution at the detection step
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(&tmp);
        let http = HttpHandler::new(&config).unwrap();
        let processor = DistributionProcessor::new(config);

        let result = processor
            .download_and_extract(
                &http,
                &format!("{}/nothing.zip", server.url()),
                &tmp.path().join("out"),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.error_stage, Some(ErrorStage::Detection));
        assert!(result.error_message.unwrap().contains("HTTP 404"));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_ixbrl_single_file_route() {
        // REQUIREMENT: iXBRL documents move into place with files_extracted=1
        // PURPOSE: Verify the no-extraction route
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/accounts.xhtml")
            .with_status(200)
            .with_header("content-type", "application/xhtml+xml")
            .create_async()
            .await;
        server
            .mock("GET", "/accounts.xhtml")
            .with_status(200)
            .with_body("<html><body>accounts</body></html>")
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(&tmp);
        let http = HttpHandler::new(&config).unwrap();
        let processor = DistributionProcessor::new(config);

        let target = tmp.path().join("out");
        let result = processor
            .download_and_extract(&http, &format!("{}/accounts.xhtml", server.url()), &target)
            .await;

        assert!(result.success, "{:?}", result.error_message);
        assert_eq!(result.extraction_result.unwrap().files_extracted, 1);
        assert!(target.join("accounts.xhtml").is_file());
    }
}
