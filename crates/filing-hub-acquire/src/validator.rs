use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use filing_hub_core::config::SafetyConfig;
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};

use crate::result::ValidationResult;

/// Filename patterns that usually identify the XBRL instance document
const INSTANCE_FILE_PATTERNS: &[&str] = &[".xhtml", ".html", "_htm.xml", ".xml"];

const VALID_URL_SCHEMES: &[&str] = &["http", "https"];

/// Pre-download and post-extraction validation.
///
/// The database is updated only for artifacts this validator has confirmed
/// on disk.
pub struct Validator {
    safety: SafetyConfig,
}

impl Validator {
    pub fn new(safety: SafetyConfig) -> Self {
        Self { safety }
    }

    /// Validate URL shape before any download work
    pub fn validate_url(&self, url: &str) -> bool {
        match url::Url::parse(url) {
            Ok(parsed) => {
                if !VALID_URL_SCHEMES.contains(&parsed.scheme()) {
                    warn!("URL must be HTTP/HTTPS: {}", url);
                    return false;
                }
                if parsed.host_str().map(str::is_empty).unwrap_or(true) {
                    warn!("Invalid URL format: {}", url);
                    return false;
                }
                true
            }
            Err(_) => {
                warn!("Invalid URL format: {}", url);
                false
            }
        }
    }

    /// Validate a downloaded file: exists, is a file, meets the minimum
    /// size, and is readable.
    pub fn validate_download(&self, file_path: &Path) -> ValidationResult {
        info!("{} Validating download: {}", LOG_INPUT, file_path.display());

        let mut result = ValidationResult::new();

        if !file_path.exists() {
            result.add_check(
                "file_exists",
                false,
                Some("File does not exist on disk".to_string()),
            );
            return result;
        }
        result.add_check("file_exists", true, None);

        if !file_path.is_file() {
            result.add_check("is_file", false, Some("Path is not a file".to_string()));
            return result;
        }
        result.add_check("is_file", true, None);

        match std::fs::metadata(file_path) {
            Ok(meta) if meta.len() >= self.safety.min_file_size => {
                result.add_check("minimum_size", true, None);
            }
            Ok(meta) => {
                result.add_check(
                    "minimum_size",
                    false,
                    Some(format!(
                        "File too small: {} bytes (minimum {})",
                        meta.len(),
                        self.safety.min_file_size
                    )),
                );
            }
            Err(e) => {
                result.add_check(
                    "minimum_size",
                    false,
                    Some(format!("Cannot read file size: {}", e)),
                );
            }
        }

        match std::fs::File::open(file_path) {
            Ok(_) => result.add_check("readable", true, None),
            Err(e) => result.add_check("readable", false, Some(format!("Not readable: {}", e))),
        }

        info!(
            "{} Validation: {}",
            LOG_OUTPUT,
            if result.valid { "PASSED" } else { "FAILED" }
        );

        result
    }

    /// Validate an extraction directory: exists, is a directory, holds at
    /// least `expected_min_files` files (recursive), and is traversable.
    pub fn validate_extraction(
        &self,
        directory: &Path,
        expected_min_files: usize,
    ) -> ValidationResult {
        info!("{} Validating extraction: {}", LOG_INPUT, directory.display());

        let mut result = ValidationResult::new();

        if !directory.exists() {
            result.add_check(
                "directory_exists",
                false,
                Some("Directory does not exist".to_string()),
            );
            return result;
        }
        result.add_check("directory_exists", true, None);

        if !directory.is_dir() {
            result.add_check(
                "is_directory",
                false,
                Some("Path is not a directory".to_string()),
            );
            return result;
        }
        result.add_check("is_directory", true, None);

        let file_count = count_files_recursive(directory, self.safety.max_extraction_depth);
        result.file_count = file_count;

        if file_count >= expected_min_files {
            result.add_check("minimum_files", true, None);
        } else {
            result.add_check(
                "minimum_files",
                false,
                Some(format!(
                    "Too few files: {} (expected >={})",
                    file_count, expected_min_files
                )),
            );
        }

        match std::fs::read_dir(directory) {
            Ok(_) => result.add_check("accessible", true, None),
            Err(e) => result.add_check(
                "accessible",
                false,
                Some(format!("Directory not accessible: {}", e)),
            ),
        }

        info!(
            "{} Validation: {}",
            LOG_OUTPUT,
            if result.valid { "PASSED" } else { "FAILED" }
        );
        info!("{} Files found: {}", LOG_OUTPUT, result.file_count);

        result
    }

    /// Locate the XBRL instance document inside an extracted filing.
    ///
    /// Patterns are tried in preference order; the shallowest match per
    /// pattern wins.
    pub fn find_instance_file(&self, directory: &Path) -> Option<PathBuf> {
        info!("{} Searching for instance file in: {}", LOG_INPUT, directory.display());

        if !directory.is_dir() {
            warn!("Directory does not exist");
            return None;
        }

        for pattern in INSTANCE_FILE_PATTERNS {
            let mut matches: Vec<PathBuf> = WalkDir::new(directory)
                .max_depth(self.safety.max_extraction_depth)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter(|entry| {
                    entry
                        .file_name()
                        .to_str()
                        .map(|name| name.to_lowercase().ends_with(pattern))
                        .unwrap_or(false)
                })
                .map(|entry| entry.into_path())
                .collect();

            matches.sort_by_key(|path| path.components().count());

            if let Some(found) = matches.into_iter().next() {
                info!("{} Found instance file: {}", LOG_OUTPUT, found.display());
                return Some(found);
            }
        }

        info!("{} No instance file found", LOG_PROCESS);
        None
    }
}

/// Count regular files under `directory` up to `max_depth` levels
pub fn count_files_recursive(directory: &Path, max_depth: usize) -> usize {
    WalkDir::new(directory)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .count()
}
