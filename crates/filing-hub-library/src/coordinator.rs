//! Per-filing library workflow orchestration.
//!
//! For each parsed filing: extract namespaces, resolve them to required
//! libraries, dual-verify against database and disk, enqueue what is
//! missing, and cache the composed result.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use filing_hub_core::database::DatabasePool;
use filing_hub_core::error::AppResult;
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};
use filing_hub_core::models::{NewTaxonomyLibrary, TaxonomyLibrary};
use filing_hub_core::Config;

use crate::availability::AvailabilityChecker;
use crate::cache::ResultCache;
use crate::parsed::{ParsedFileLocation, ParsedReader};
use crate::resolver::NamespaceResolver;

/// Composed result of processing one filing's library requirements
#[derive(Debug, Clone)]
pub struct FilingLibraryReport {
    pub filing_id: String,
    pub success: bool,
    pub namespaces_detected: usize,
    pub libraries_required: Vec<String>,
    pub libraries_available: usize,
    pub libraries_missing: usize,
    pub libraries_enqueued: usize,
    pub reconciliation_updates: usize,
    pub error: Option<String>,
}

impl FilingLibraryReport {
    pub fn libraries_ready(&self) -> bool {
        self.success && self.libraries_missing == 0
    }

    fn failed(filing_id: &str, error: String) -> Self {
        Self {
            filing_id: filing_id.to_string(),
            success: false,
            namespaces_detected: 0,
            libraries_required: Vec::new(),
            libraries_available: 0,
            libraries_missing: 0,
            libraries_enqueued: 0,
            reconciliation_updates: 0,
            error: Some(error),
        }
    }
}

/// Coordinates the namespace -> library workflow per filing.
pub struct LibraryCoordinator {
    pool: DatabasePool,
    parser_output_root: PathBuf,
    reader: ParsedReader,
    resolver: NamespaceResolver,
    checker: AvailabilityChecker,
    cache: Mutex<ResultCache>,
    processed: Mutex<HashSet<String>>,
}

impl LibraryCoordinator {
    pub fn new(pool: DatabasePool, config: &Config) -> Self {
        info!("{} Initializing library coordinator", LOG_PROCESS);

        let checker = AvailabilityChecker::new(
            pool.clone(),
            &config.paths.taxonomies_dir,
            config.library.min_files_threshold,
        );

        Self {
            pool,
            // Parsed descriptors land under the entities tree next to the
            // extracted filings
            parser_output_root: config.paths.entities_dir.clone(),
            reader: ParsedReader::new(),
            resolver: NamespaceResolver::new(),
            checker,
            cache: Mutex::new(ResultCache::new(Duration::from_secs(
                config.library.cache_ttl_seconds,
            ))),
            processed: Mutex::new(HashSet::new()),
        }
    }

    /// Process one filing's descriptor
    pub async fn process_filing(&self, location: &ParsedFileLocation) -> FilingLibraryReport {
        let filing_id = &location.filing_id;

        info!("{} Processing filing: {}", LOG_INPUT, filing_id);

        if let Some(cached) = self.cache.lock().await.get(filing_id) {
            info!("{} Using cached result for {}", LOG_OUTPUT, filing_id);
            return cached.clone();
        }

        let report = match self.process_filing_inner(location).await {
            Ok(report) => report,
            Err(e) => {
                error!("Error processing filing {}: {}", filing_id, e);
                FilingLibraryReport::failed(filing_id, e.to_string())
            }
        };

        if report.success {
            self.cache.lock().await.put(filing_id, report.clone());
        }

        report
    }

    async fn process_filing_inner(
        &self,
        location: &ParsedFileLocation,
    ) -> AppResult<FilingLibraryReport> {
        let filing_id = &location.filing_id;

        // Step 1: extract namespaces from the descriptor
        let info = self.reader.read_file(&location.parsed_json_path);
        if !info.success {
            return Ok(FilingLibraryReport::failed(
                filing_id,
                info.error.unwrap_or_else(|| "Unreadable descriptor".to_string()),
            ));
        }

        if info.namespaces.is_empty() {
            info!("{} No taxonomy namespaces detected", LOG_OUTPUT);
            return Ok(FilingLibraryReport {
                filing_id: filing_id.clone(),
                success: true,
                namespaces_detected: 0,
                libraries_required: Vec::new(),
                libraries_available: 0,
                libraries_missing: 0,
                libraries_enqueued: 0,
                reconciliation_updates: 0,
                error: None,
            });
        }

        info!("{} Detected {} namespaces", LOG_OUTPUT, info.namespaces.len());

        // Step 2: resolve to required libraries
        let required = self.resolver.get_required_libraries(&info.namespaces, true);
        info!("{} Requires {} libraries", LOG_OUTPUT, required.len());

        // Step 3: dual verification with reconciliation
        let availability = self.checker.check_library_availability(&required).await?;

        if availability.reconciliation_updates > 0 {
            info!(
                "{} Reconciled {} database/physical mismatches",
                LOG_OUTPUT, availability.reconciliation_updates
            );
        }

        // Step 4: enqueue the still-missing libraries
        let filing_uuid = filing_uuid_from_id(filing_id);
        let mut enqueued = 0usize;

        for library in &availability.missing {
            let new_library = NewTaxonomyLibrary::pending(
                &library.taxonomy_name,
                &library.version,
                &library.namespace,
                &library.download_url,
                filing_uuid,
            );

            match TaxonomyLibrary::upsert(&self.pool, &new_library, filing_uuid).await {
                Ok(outcome) if outcome.saved => enqueued += 1,
                Ok(_) => {}
                Err(e) => warn!(
                    "Failed to enqueue {} v{}: {}",
                    library.taxonomy_name, library.version, e
                ),
            }
        }

        if enqueued > 0 {
            info!("{} Enqueued {} missing libraries", LOG_OUTPUT, enqueued);
        }

        Ok(FilingLibraryReport {
            filing_id: filing_id.clone(),
            success: true,
            namespaces_detected: info.namespaces.len(),
            libraries_required: required
                .iter()
                .map(|lib| format!("{} v{}", lib.taxonomy_name, lib.version))
                .collect(),
            libraries_available: availability.available_count(),
            libraries_missing: availability.missing_count(),
            libraries_enqueued: enqueued,
            reconciliation_updates: availability.reconciliation_updates,
            error: None,
        })
    }

    /// Process every filing not yet handled this session
    pub async fn process_new_filings(&self) -> Vec<FilingLibraryReport> {
        info!("{} Processing new filings", LOG_INPUT);

        let locations = self.reader.discover_all(&self.parser_output_root);

        let new_locations: Vec<ParsedFileLocation> = {
            let processed = self.processed.lock().await;
            locations
                .into_iter()
                .filter(|loc| !processed.contains(&loc.filing_id))
                .collect()
        };

        info!(
            "{} Found {} new filings to process",
            LOG_OUTPUT,
            new_locations.len()
        );

        let mut reports = Vec::new();
        for location in &new_locations {
            let report = self.process_filing(location).await;

            if report.success {
                self.processed.lock().await.insert(location.filing_id.clone());
            }

            reports.push(report);
        }

        reports
    }

    /// Session statistics for the monitor loop
    pub async fn statistics(&self) -> (usize, usize) {
        let processed = self.processed.lock().await.len();
        let cached = self.cache.lock().await.len();
        (processed, cached)
    }

    /// Forget processed-filing tracking (used by long monitor sessions)
    pub async fn reset_processed(&self) -> usize {
        let mut processed = self.processed.lock().await;
        let count = processed.len();
        processed.clear();
        count
    }
}

/// Filing ids derived from directory layout are not UUIDs; when a descriptor
/// folder is named by its search UUID we link the dependency, otherwise the
/// library rides without a backreference.
fn filing_uuid_from_id(filing_id: &str) -> Option<Uuid> {
    filing_id
        .rsplit('/')
        .next()
        .and_then(|last| Uuid::parse_str(last).ok())
}
