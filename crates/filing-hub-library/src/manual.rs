//! Manual taxonomy drop processing.
//!
//! When every automatic URL fails, the operator downloads the archive by
//! hand and drops it into `{manual_downloads}`. This module extracts such
//! archives into the taxonomy layout, registers the library as completed,
//! and archives the source file under `{manual_processed}`.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use filing_hub_acquire::archive::{ArchiveHandler, ArchiveKind};
use filing_hub_acquire::validator::count_files_recursive;
use filing_hub_core::config::PathsConfig;
use filing_hub_core::database::DatabasePool;
use filing_hub_core::error::{AppError, AppResult};
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};
use filing_hub_core::models::{NewTaxonomyLibrary, TaxonomyLibrary};
use filing_hub_core::Config;

/// One archive found in the manual drop directory
#[derive(Debug, Clone)]
pub struct ManualDrop {
    pub path: PathBuf,
    pub taxonomy_name: String,
    pub taxonomy_version: String,
}

/// Result of processing one manual drop
#[derive(Debug, Clone)]
pub struct ManualProcessOutcome {
    pub taxonomy_name: String,
    pub taxonomy_version: String,
    pub files_extracted: usize,
    pub archived_to: PathBuf,
}

/// Processes operator-supplied archives from the manual drop directory.
pub struct ManualProcessor {
    pool: DatabasePool,
    paths: PathsConfig,
    archive_handler: ArchiveHandler,
    min_files_threshold: i32,
}

impl ManualProcessor {
    pub fn new(pool: DatabasePool, config: &Config) -> Self {
        Self {
            pool,
            paths: config.paths.clone(),
            archive_handler: ArchiveHandler::new(config.safety.clone()),
            min_files_threshold: config.library.min_files_threshold,
        }
    }

    /// Scan the manual drop directory for recognizable archives.
    ///
    /// Filenames are expected as `{name}-{version}.zip` (or another
    /// supported archive suffix); files that do not parse are reported but
    /// skipped.
    pub fn scan_manual_directory(&self) -> AppResult<Vec<ManualDrop>> {
        info!(
            "{} Scanning manual downloads: {}",
            LOG_INPUT,
            self.paths.manual_downloads_dir.display()
        );

        if !self.paths.manual_downloads_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut drops = Vec::new();

        for entry in std::fs::read_dir(&self.paths.manual_downloads_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            if ArchiveKind::from_filename(&filename).is_none() {
                warn!("Skipping non-archive file in manual drop: {}", filename);
                continue;
            }

            match parse_drop_filename(&filename) {
                Some((name, version)) => drops.push(ManualDrop {
                    path,
                    taxonomy_name: name,
                    taxonomy_version: version,
                }),
                None => warn!(
                    "Cannot parse taxonomy name/version from: {} (expected name-version.zip)",
                    filename
                ),
            }
        }

        info!("{} Found {} manual drops", LOG_OUTPUT, drops.len());
        Ok(drops)
    }

    /// Extract one drop, register the library, and archive the source file
    pub async fn process_manual_file(&self, drop: &ManualDrop) -> AppResult<ManualProcessOutcome> {
        info!(
            "{} Processing manual drop: {} v{}",
            LOG_INPUT, drop.taxonomy_name, drop.taxonomy_version
        );

        let target_dir = self
            .paths
            .taxonomies_dir
            .join(&drop.taxonomy_name)
            .join(&drop.taxonomy_version);

        let extraction = self.archive_handler.extract(&drop.path, &target_dir, false);
        if !extraction.success {
            return Err(AppError::ExtractionError(
                extraction
                    .error_message
                    .unwrap_or_else(|| "Extraction failed".to_string()),
            ));
        }

        let file_count = count_files_recursive(&target_dir, 16) as i32;
        if file_count <= self.min_files_threshold {
            return Err(AppError::ValidationError(format!(
                "Extracted library has only {} files (threshold {})",
                file_count, self.min_files_threshold
            )));
        }

        // Register as completed; manual drops have no source URL
        let namespace = format!(
            "manual://{}/{}",
            drop.taxonomy_name, drop.taxonomy_version
        );
        let new_library = NewTaxonomyLibrary::pending(
            &drop.taxonomy_name,
            &drop.taxonomy_version,
            &namespace,
            "",
            None,
        );
        TaxonomyLibrary::register_found(
            &self.pool,
            &new_library,
            &target_dir.display().to_string(),
            file_count,
        )
        .await?;

        // Archive the processed source file
        let archived_to = self.archive_processed_file(&drop.path)?;

        info!(
            "{} Manual drop processed: {} v{} ({} files)",
            LOG_OUTPUT, drop.taxonomy_name, drop.taxonomy_version, file_count
        );

        Ok(ManualProcessOutcome {
            taxonomy_name: drop.taxonomy_name.clone(),
            taxonomy_version: drop.taxonomy_version.clone(),
            files_extracted: file_count as usize,
            archived_to,
        })
    }

    /// Process everything currently in the drop directory
    pub async fn process_all(&self) -> AppResult<Vec<ManualProcessOutcome>> {
        let drops = self.scan_manual_directory()?;
        let mut outcomes = Vec::new();

        for drop in &drops {
            match self.process_manual_file(drop).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(
                    "Failed to process {} v{}: {}",
                    drop.taxonomy_name, drop.taxonomy_version, e
                ),
            }
        }

        Ok(outcomes)
    }

    fn archive_processed_file(&self, source: &Path) -> AppResult<PathBuf> {
        std::fs::create_dir_all(&self.paths.manual_processed_dir)?;

        let original_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("archive");
        let timestamp = Utc::now().format("%Y%m%d%H%M%S");
        let archived = self
            .paths
            .manual_processed_dir
            .join(format!("{}_{}", timestamp, original_name));

        info!("{} Archiving processed file to {}", LOG_PROCESS, archived.display());
        std::fs::rename(source, &archived).or_else(|_| {
            std::fs::copy(source, &archived)
                .and_then(|_| std::fs::remove_file(source))
                .map(|_| ())
        })?;

        Ok(archived)
    }

    /// Operator-facing instructions for the manual workflow
    pub fn manual_instructions(&self) -> String {
        format!(
            "Manual taxonomy download workflow:\n\n\
             1. Identify the failed library (library --list-pending)\n\
             2. Download its archive from the official source\n\
             3. Name it {{taxonomy}}-{{version}}.zip (e.g. us-gaap-2024.zip)\n\
             4. Place it in: {}\n\
             5. Run: library --manual\n\n\
             Processed archives are moved to: {}",
            self.paths.manual_downloads_dir.display(),
            self.paths.manual_processed_dir.display(),
        )
    }
}

/// Parse `{name}-{version}.{archive-ext}` into name and version.
/// The version suffix may be a year (`2024`) or a dated release
/// (`2024-03-27`).
pub fn parse_drop_filename(filename: &str) -> Option<(String, String)> {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static DROP_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(.+)-(\d{4}(?:-\d{2}-\d{2})?)\.(?:zip|tar|tar\.gz|tgz|tar\.bz2|tbz2|tar\.xz|txz)$")
            .expect("valid drop filename regex")
    });

    let captures = DROP_RE.captures(filename)?;
    let name = captures.get(1)?.as_str();
    let version = captures.get(2)?.as_str();

    if name.is_empty() {
        return None;
    }

    Some((name.to_string(), version.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drop_filename() {
        // REQUIREMENT: Manual drops are named {name}-{version}.zip
        // PURPOSE: Verify parsing across archive types and bad names
        assert_eq!(
            parse_drop_filename("us-gaap-2024.zip"),
            Some(("us-gaap".to_string(), "2024".to_string()))
        );
        assert_eq!(
            parse_drop_filename("full_ifrs-2024-03-27.tar.gz"),
            Some(("full_ifrs".to_string(), "2024-03-27".to_string()))
        );
        assert_eq!(
            parse_drop_filename("dei-2024.tar.gz"),
            Some(("dei".to_string(), "2024".to_string()))
        );
        assert_eq!(parse_drop_filename("no-version-here.zip"), None);
        assert_eq!(parse_drop_filename("plainfile.txt"), None);
        assert_eq!(parse_drop_filename("-2024.zip"), None);
    }
}
