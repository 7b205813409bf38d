use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Stage at which a processing attempt failed.
///
/// Carried on failure rows so the retry monitor and the CLI can attribute
/// each failure to the step that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorStage {
    Detection,
    Download,
    Extraction,
    XsdDownload,
    DirectoryMirror,
    IxbrlDownload,
    Validation,
    Verification,
    Database,
    Unexpected,
}

impl std::fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorStage::Detection => write!(f, "detection"),
            ErrorStage::Download => write!(f, "download"),
            ErrorStage::Extraction => write!(f, "extraction"),
            ErrorStage::XsdDownload => write!(f, "xsd_download"),
            ErrorStage::DirectoryMirror => write!(f, "directory_mirror"),
            ErrorStage::IxbrlDownload => write!(f, "ixbrl_download"),
            ErrorStage::Validation => write!(f, "validation"),
            ErrorStage::Verification => write!(f, "verification"),
            ErrorStage::Database => write!(f, "database"),
            ErrorStage::Unexpected => write!(f, "unexpected"),
        }
    }
}

/// Result of a single HTTP download to disk
#[derive(Debug, Clone, Default)]
pub struct DownloadResult {
    pub success: bool,
    pub url: String,
    pub file_path: Option<PathBuf>,
    pub file_size: u64,
    pub chunks_downloaded: u64,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    pub duration: Duration,
}

impl DownloadResult {
    pub fn new(url: &str, file_path: &std::path::Path) -> Self {
        Self {
            url: url.to_string(),
            file_path: Some(file_path.to_path_buf()),
            ..Default::default()
        }
    }

    /// Mean throughput in MB/s for the completed download
    pub fn download_speed_mbps(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        (self.file_size as f64 / (1024.0 * 1024.0)) / secs
    }
}

/// Result of extracting or materializing files into a target directory
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub success: bool,
    pub archive_path: Option<PathBuf>,
    pub extract_directory: Option<PathBuf>,
    pub files_extracted: usize,
    pub error_message: Option<String>,
    pub duration: Duration,
}

impl ExtractionResult {
    pub fn succeeded(extract_directory: &std::path::Path, files_extracted: usize) -> Self {
        Self {
            success: true,
            extract_directory: Some(extract_directory.to_path_buf()),
            files_extracted,
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Result of validating a download or extraction
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub file_count: usize,
    pub checks: Vec<ValidationCheck>,
}

#[derive(Debug, Clone)]
pub struct ValidationCheck {
    pub name: &'static str,
    pub passed: bool,
    pub detail: Option<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            ..Default::default()
        }
    }

    pub fn add_check(&mut self, name: &'static str, passed: bool, detail: Option<String>) {
        if !passed {
            self.valid = false;
        }
        self.checks.push(ValidationCheck {
            name,
            passed,
            detail,
        });
    }

    /// First failed check's detail, for failure messages
    pub fn first_failure(&self) -> Option<&str> {
        self.checks
            .iter()
            .find(|c| !c.passed)
            .and_then(|c| c.detail.as_deref())
    }
}

/// End-to-end result of one processing attempt.
///
/// Carries the download and extraction sub-results so the failure handler
/// can extract the deepest non-empty error message for the failing stage.
#[derive(Debug, Clone, Default)]
pub struct ProcessingResult {
    pub success: bool,
    pub error_stage: Option<ErrorStage>,
    pub error_message: Option<String>,
    pub download_result: Option<DownloadResult>,
    pub extraction_result: Option<ExtractionResult>,
    pub total_duration: Duration,
}

impl ProcessingResult {
    pub fn failed_at(stage: ErrorStage, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_stage: Some(stage),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}
