//! Dual verification of taxonomy library availability.
//!
//! A library counts as available only when the database claims it
//! (`completed` with enough files) AND the directory physically holds more
//! files than the threshold. Divergence is reconciled: disk-only libraries
//! are registered, database-only claims are downgraded to missing.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use filing_hub_core::database::DatabasePool;
use filing_hub_core::error::AppResult;
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};
use filing_hub_core::models::{NewTaxonomyLibrary, TaxonomyLibrary};

use crate::resolver::ResolvedNamespace;
use filing_hub_acquire::validator::count_files_recursive;

/// Depth bound for recursive file counting
const COUNT_MAX_DEPTH: usize = 16;

/// Result of one dual-verification pass
#[derive(Debug, Clone, Default)]
pub struct AvailabilityReport {
    pub available: Vec<ResolvedNamespace>,
    pub missing: Vec<ResolvedNamespace>,
    pub reconciliation_updates: usize,
    /// DB claimed ready but disk was empty (downgraded)
    pub db_only_count: usize,
    /// Disk held files the DB did not know about (registered)
    pub disk_only_count: usize,
}

impl AvailabilityReport {
    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }
}

/// Checks library availability with dual verification and applies
/// reconciliation writes.
pub struct AvailabilityChecker {
    pool: DatabasePool,
    taxonomies_root: PathBuf,
    min_files_threshold: i32,
}

impl AvailabilityChecker {
    pub fn new(pool: DatabasePool, taxonomies_root: &Path, min_files_threshold: i32) -> Self {
        debug!(
            "{} Availability checker initialized (threshold={} files)",
            LOG_PROCESS, min_files_threshold
        );

        Self {
            pool,
            taxonomies_root: taxonomies_root.to_path_buf(),
            min_files_threshold,
        }
    }

    /// Dual-verify each required library and reconcile divergence.
    pub async fn check_library_availability(
        &self,
        required: &[ResolvedNamespace],
    ) -> AppResult<AvailabilityReport> {
        info!(
            "{} Checking availability of {} libraries",
            LOG_INPUT,
            required.len()
        );

        let mut report = AvailabilityReport::default();

        for library in required {
            let name = &library.taxonomy_name;
            let version = &library.version;

            debug!("{} Checking {} v{}", LOG_PROCESS, name, version);

            let db_row = TaxonomyLibrary::find_by_name_version(&self.pool, name, version).await?;
            let db_ready = db_row
                .as_ref()
                .map(|row| {
                    row.download_status == "completed"
                        && row.total_files.unwrap_or(0) > self.min_files_threshold
                })
                .unwrap_or(false);

            let disk_state = self.check_disk(name, version);

            match (db_ready, &disk_state) {
                (true, Some(_)) => {
                    debug!("{} Available: {} v{}", LOG_OUTPUT, name, version);
                    if let Some(row) = &db_row {
                        TaxonomyLibrary::touch_verified(&self.pool, row.library_id).await?;
                    }
                    report.available.push(library.clone());
                }
                (true, None) => {
                    // Database claims ready but the files are gone
                    warn!(
                        "Database claims {}-{} is available but files are missing/incomplete",
                        name, version
                    );
                    if let Some(row) = &db_row {
                        TaxonomyLibrary::mark_missing(&self.pool, row.library_id).await?;
                    }
                    report.db_only_count += 1;
                    report.reconciliation_updates += 1;
                    report.missing.push(library.clone());
                }
                (false, Some((dir, count))) => {
                    // Files exist but the database does not know; register
                    info!(
                        "Found {}-{} on disk but not ready in database - registering",
                        name, version
                    );
                    let new_library = NewTaxonomyLibrary::pending(
                        name,
                        version,
                        &library.namespace,
                        &library.download_url,
                        None,
                    );
                    TaxonomyLibrary::register_found(
                        &self.pool,
                        &new_library,
                        &dir.display().to_string(),
                        *count,
                    )
                    .await?;

                    report.disk_only_count += 1;
                    report.reconciliation_updates += 1;
                    report.available.push(library.clone());
                }
                (false, None) => {
                    debug!("{} Missing: {} v{} (db=false, disk=false)", LOG_OUTPUT, name, version);
                    report.missing.push(library.clone());
                }
            }
        }

        info!(
            "{} Availability check: {} available, {} missing, {} reconciled",
            LOG_OUTPUT,
            report.available_count(),
            report.missing_count(),
            report.reconciliation_updates
        );

        Ok(report)
    }

    /// Disk predicate: the expected directory exists and recursively holds
    /// more files than the threshold. Several naming layouts are tried.
    fn check_disk(&self, name: &str, version: &str) -> Option<(PathBuf, i32)> {
        for candidate in self.candidate_directories(name, version) {
            if !candidate.is_dir() {
                continue;
            }

            let count = count_files_recursive(&candidate, COUNT_MAX_DEPTH) as i32;
            if count > self.min_files_threshold {
                return Some((candidate, count));
            }
        }

        None
    }

    /// Naming layouts checked on disk, canonical first
    fn candidate_directories(&self, name: &str, version: &str) -> Vec<PathBuf> {
        vec![
            self.taxonomies_root.join(name).join(version),
            self.taxonomies_root.join(format!("{}-{}", name, version)),
            self.taxonomies_root.join(name),
            self.taxonomies_root.join(format!("{}_{}", name, version)),
        ]
    }
}
