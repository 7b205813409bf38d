use tracing::error;

use filing_hub_core::database::DatabasePool;
use filing_hub_core::error::AppResult;
use filing_hub_core::logging::LOG_OUTPUT;
use filing_hub_core::models::{FilingSearch, TaxonomyLibrary};

use crate::paths::WorkItem;
use crate::result::{ErrorStage, ProcessingResult};

/// Writes terminal failure rows with stage-attributed messages.
pub struct FailureHandler {
    pool: DatabasePool,
}

impl FailureHandler {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Record a failed processing attempt.
    ///
    /// Filings get the message in their metadata sidecar; taxonomies get the
    /// dedicated failure columns plus attempt accounting.
    pub async fn handle_failure(&self, item: &WorkItem, result: &ProcessingResult) -> AppResult<()> {
        let stage = result.error_stage.unwrap_or(ErrorStage::Unexpected);
        let details = extract_error_details(result);
        let error_msg = format!("Failed at {}: {}", stage, details);

        error!("{} Download FAILED: {}", LOG_OUTPUT, error_msg);

        match item {
            WorkItem::Filing(filing) => {
                FilingSearch::mark_failed(&self.pool, filing.search_id, &error_msg).await
            }
            WorkItem::Taxonomy(library) => {
                let reason = failure_reason(result, &details);
                TaxonomyLibrary::mark_failed(
                    &self.pool,
                    library.library_id,
                    &stage.to_string(),
                    reason,
                    &error_msg,
                )
                .await
            }
        }
    }
}

/// Extract the deepest non-empty error message by failing stage
pub fn extract_error_details(result: &ProcessingResult) -> String {
    match result.error_stage {
        Some(ErrorStage::Detection) => result
            .error_message
            .clone()
            .unwrap_or_else(|| "Distribution detection failed".to_string()),
        Some(ErrorStage::Download) => result
            .download_result
            .as_ref()
            .and_then(|d| d.error_message.clone())
            .or_else(|| result.error_message.clone())
            .unwrap_or_else(|| "Download failed".to_string()),
        Some(ErrorStage::Extraction) => result
            .extraction_result
            .as_ref()
            .and_then(|e| e.error_message.clone())
            .or_else(|| result.error_message.clone())
            .unwrap_or_else(|| "Extraction failed".to_string()),
        Some(ErrorStage::XsdDownload) => result
            .error_message
            .clone()
            .unwrap_or_else(|| "XSD download failed".to_string()),
        Some(ErrorStage::DirectoryMirror) => result
            .error_message
            .clone()
            .unwrap_or_else(|| "Directory mirror failed".to_string()),
        Some(ErrorStage::IxbrlDownload) => result
            .error_message
            .clone()
            .unwrap_or_else(|| "iXBRL download failed".to_string()),
        Some(ErrorStage::Validation) => "Validation failed - no files found".to_string(),
        Some(ErrorStage::Verification) => "File verification failed".to_string(),
        Some(ErrorStage::Database) => "Database update failed".to_string(),
        Some(ErrorStage::Unexpected) | None => "Unexpected error occurred".to_string(),
    }
}

/// Reason code for the retry monitor's strategy table
pub fn failure_reason(result: &ProcessingResult, details: &str) -> &'static str {
    let details_lower = details.to_lowercase();

    match result.error_stage {
        Some(ErrorStage::Detection) => "invalid_url",
        Some(ErrorStage::Download | ErrorStage::IxbrlDownload | ErrorStage::XsdDownload
            | ErrorStage::DirectoryMirror) => {
            if details_lower.contains("404") {
                "url_404"
            } else if details_lower.contains("403") {
                "url_403"
            } else if details_lower.contains("timeout") {
                "timeout"
            } else if details_lower.contains("dns") {
                "dns_error"
            } else if details_lower.contains("filesystem") {
                "disk_full"
            } else {
                "network_error"
            }
        }
        Some(ErrorStage::Extraction) => {
            if details_lower.contains("invalid zip") || details_lower.contains("invalid tar") {
                "corrupted_zip"
            } else if details_lower.contains("unsupported_format")
                || details_lower.contains("unsafe_paths")
                || details_lower.contains("too large")
                || details_lower.contains("too deep")
            {
                "invalid_archive"
            } else {
                "extraction_error"
            }
        }
        Some(ErrorStage::Validation | ErrorStage::Verification) => "incomplete_download",
        Some(ErrorStage::Database) => "database_error",
        Some(ErrorStage::Unexpected) | None => "unexpected_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{DownloadResult, ExtractionResult};

    #[test]
    fn test_extract_error_details_by_stage() {
        // REQUIREMENT: The failure message comes from the failing stage's
        //              sub-result
        // PURPOSE: Verify message extraction walks the right branch
        let mut result = ProcessingResult::failed_at(ErrorStage::Download, "outer message");
        result.download_result = Some(DownloadResult {
            error_message: Some("HTTP 404".to_string()),
            ..Default::default()
        });
        assert_eq!(extract_error_details(&result), "HTTP 404");

        let mut result = ProcessingResult::failed_at(ErrorStage::Extraction, "outer");
        result.extraction_result = Some(ExtractionResult::failed("unsafe_paths: ../x"));
        assert_eq!(extract_error_details(&result), "unsafe_paths: ../x");

        let result = ProcessingResult::failed_at(ErrorStage::Validation, "ignored");
        assert_eq!(extract_error_details(&result), "Validation failed - no files found");

        let result = ProcessingResult::failed_at(ErrorStage::Verification, "ignored");
        assert_eq!(extract_error_details(&result), "File verification failed");

        let result = ProcessingResult::failed_at(ErrorStage::Database, "ignored");
        assert_eq!(extract_error_details(&result), "Database update failed");
    }

    #[test]
    fn test_failure_reason_classification() {
        // REQUIREMENT: Failure reasons feed the retry monitor's strategy table
        // PURPOSE: Verify reason codes for the main failure classes
        let download_404 = ProcessingResult::failed_at(ErrorStage::Download, "x");
        assert_eq!(failure_reason(&download_404, "HTTP 404"), "url_404");
        assert_eq!(failure_reason(&download_404, "HTTP 403"), "url_403");
        assert_eq!(failure_reason(&download_404, "Timeout: deadline"), "timeout");
        assert_eq!(failure_reason(&download_404, "connection reset"), "network_error");

        let extraction = ProcessingResult::failed_at(ErrorStage::Extraction, "x");
        assert_eq!(failure_reason(&extraction, "Invalid ZIP file: eof"), "corrupted_zip");
        assert_eq!(
            failure_reason(&extraction, "unsafe_paths: ../evil"),
            "invalid_archive"
        );
        assert_eq!(failure_reason(&extraction, "io failure"), "extraction_error");

        let verification = ProcessingResult::failed_at(ErrorStage::Verification, "x");
        assert_eq!(failure_reason(&verification, "anything"), "incomplete_download");
    }
}
