use futures::StreamExt;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info, warn};

use filing_hub_core::database::DatabasePool;
use filing_hub_core::error::AppResult;
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};
use filing_hub_core::models::{
    DownloadedFiling, FilingSearch, NewDownloadedFiling, TaxonomyLibrary,
};
use filing_hub_core::Config;

use crate::failure::FailureHandler;
use crate::http::HttpHandler;
use crate::paths::{PathResolver, WorkItem};
use crate::processor::DistributionProcessor;
use crate::result::{ErrorStage, ProcessingResult};
use crate::validator::{count_files_recursive, Validator};

/// Statistics for one coordinator run
#[derive(Debug, Clone, Default)]
pub struct ProcessingStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_seconds: f64,
}

/// Orchestrates one processing attempt end-to-end per queued work item.
///
/// Per item the state machine is strictly sequential:
/// queued -> downloading -> extracting -> validating -> verifying ->
/// db-commit -> completed, with any state able to fall to failed. The
/// database is committed only after the files are verified on disk.
pub struct DownloadCoordinator {
    pool: DatabasePool,
    config: Config,
    http: HttpHandler,
    processor: DistributionProcessor,
    validator: Validator,
    path_resolver: PathResolver,
    failure_handler: FailureHandler,
    shutdown: watch::Receiver<bool>,
}

impl DownloadCoordinator {
    pub fn new(
        pool: DatabasePool,
        config: Config,
        shutdown: watch::Receiver<bool>,
    ) -> AppResult<Self> {
        config.paths.ensure_all_directories()?;

        let http = HttpHandler::new(&config)?;
        let processor = DistributionProcessor::new(config.clone());
        let validator = Validator::new(config.safety.clone());
        let path_resolver =
            PathResolver::new(&config.paths.entities_dir, &config.paths.taxonomies_dir);
        let failure_handler = FailureHandler::new(pool.clone());

        Ok(Self {
            pool,
            config,
            http,
            processor,
            validator,
            path_resolver,
            failure_handler,
            shutdown,
        })
    }

    /// A shutdown handle wired to Ctrl-C: the current items finish, no new
    /// items are dequeued.
    pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    /// Fetch the downloadable queue: pending and failed filings and
    /// taxonomies, failed surfaced first within each kind.
    pub async fn pending_work_items(&self, limit: i64) -> AppResult<Vec<WorkItem>> {
        let filings = FilingSearch::get_downloadable(&self.pool, limit).await?;
        let taxonomies = TaxonomyLibrary::get_downloadable(&self.pool, limit).await?;

        info!(
            "{} Found {} pending filings, {} pending taxonomies",
            LOG_PROCESS,
            filings.len(),
            taxonomies.len()
        );

        let mut items: Vec<WorkItem> = filings.into_iter().map(WorkItem::Filing).collect();
        items.extend(taxonomies.into_iter().map(WorkItem::Taxonomy));
        Ok(items)
    }

    /// Process up to `limit` queued items, `max_concurrent` at a time.
    pub async fn process_pending_downloads(&self, limit: i64) -> AppResult<ProcessingStats> {
        info!("{} Processing pending downloads (limit={})", LOG_INPUT, limit);

        let start = Instant::now();
        let items = self.pending_work_items(limit).await?;

        let stats = self.process_items(items).await;

        let mut stats = stats;
        stats.duration_seconds = start.elapsed().as_secs_f64();

        info!(
            "{} Processing complete: {}/{} succeeded in {:.1}s",
            LOG_OUTPUT, stats.succeeded, stats.total, stats.duration_seconds
        );

        Ok(stats)
    }

    /// Process an explicit list of work items
    pub async fn process_items(&self, items: Vec<WorkItem>) -> ProcessingStats {
        let mut stats = ProcessingStats {
            total: items.len(),
            ..Default::default()
        };

        let shutdown = self.shutdown.clone();
        let results: Vec<ProcessingResult> = futures::stream::iter(items)
            .take_while(|_| {
                let stopped = *shutdown.borrow();
                async move {
                    if stopped {
                        warn!("Shutdown requested; not dequeuing further items");
                    }
                    !stopped
                }
            })
            .map(|item| self.process_single_item(item))
            .buffer_unordered(self.config.acquisition.max_concurrent.max(1))
            .collect()
            .await;

        for result in &results {
            if result.success {
                stats.succeeded += 1;
            } else {
                stats.failed += 1;
            }
        }
        // Items skipped by shutdown count neither way
        stats.total = results.len();

        stats
    }

    /// Run the full state machine for one work item.
    ///
    /// Never panics through this boundary: every failure is recorded via the
    /// failure handler and returned as an unsuccessful result.
    pub async fn process_single_item(&self, item: WorkItem) -> ProcessingResult {
        let start = Instant::now();

        info!("{} Processing {}", LOG_INPUT, item.label());

        let mut result = self.run_state_machine(&item).await;
        result.total_duration = start.elapsed();

        if !result.success {
            if let Err(db_err) = self.failure_handler.handle_failure(&item, &result).await {
                error!("Failed to record failure: {}", db_err);
            }
        }

        result
    }

    async fn run_state_machine(&self, item: &WorkItem) -> ProcessingResult {
        // queued -> downloading: the conditional UPDATE is the ownership claim
        let claimed = match item {
            WorkItem::Filing(filing) => {
                FilingSearch::claim_for_download(&self.pool, filing.search_id).await
            }
            WorkItem::Taxonomy(library) => {
                TaxonomyLibrary::claim_for_download(&self.pool, library.library_id).await
            }
        };

        match claimed {
            Ok(true) => {}
            Ok(false) => {
                // Another coordinator owns it; not a failure of this item
                info!("{} Item already claimed elsewhere: {}", LOG_PROCESS, item.label());
                return ProcessingResult {
                    success: true,
                    ..Default::default()
                };
            }
            Err(e) => {
                return ProcessingResult::failed_at(ErrorStage::Database, e.to_string());
            }
        }

        let url = item.url().to_string();
        if !self.validator.validate_url(&url) {
            return ProcessingResult::failed_at(
                ErrorStage::Detection,
                format!("URL not accessible: invalid URL {}", url),
            );
        }

        let target_dir = self.path_resolver.target_dir(item);
        info!("{} Target directory: {}", LOG_PROCESS, target_dir.display());

        // downloading / extracting
        let mut result = self
            .processor
            .download_and_extract(&self.http, &url, &target_dir)
            .await;

        if !result.success {
            return result;
        }

        // validating
        let validation = self.validator.validate_extraction(&target_dir, 1);
        if !validation.valid {
            result.success = false;
            result.error_stage = Some(ErrorStage::Validation);
            result.error_message = validation.first_failure().map(String::from);
            return result;
        }
        info!(
            "{} Validation passed: {} files found",
            LOG_OUTPUT, validation.file_count
        );

        // verifying: paranoid recheck against concurrent cleanup
        if !target_dir.exists() {
            error!("{} CRITICAL: Directory vanished after validation!", LOG_OUTPUT);
            result.success = false;
            result.error_stage = Some(ErrorStage::Verification);
            return result;
        }

        let final_file_count =
            count_files_recursive(&target_dir, self.config.safety.max_extraction_depth);
        if final_file_count == 0 {
            error!("{} CRITICAL: Directory exists but contains no files!", LOG_OUTPUT);
            result.success = false;
            result.error_stage = Some(ErrorStage::Verification);
            return result;
        }

        info!(
            "{} Final verification passed: {} files confirmed in {}",
            LOG_OUTPUT,
            final_file_count,
            target_dir.display()
        );

        // db-commit: the on-disk artifact is already good; a write failure
        // leaves it in place for self-healing
        let commit = self
            .commit_completion(item, &target_dir, final_file_count)
            .await;

        if let Err(e) = commit {
            error!("Database update failed despite successful download: {}", e);
            result.success = false;
            result.error_stage = Some(ErrorStage::Database);
            result.error_message = Some(e.to_string());
            return result;
        }

        info!("{} {} processed successfully", LOG_OUTPUT, item.label());
        result
    }

    async fn commit_completion(
        &self,
        item: &WorkItem,
        target_dir: &std::path::Path,
        file_count: usize,
    ) -> AppResult<()> {
        match item {
            WorkItem::Filing(filing) => {
                let instance_file = self
                    .validator
                    .find_instance_file(target_dir)
                    .map(|path| path.display().to_string());

                let new_filing = NewDownloadedFiling {
                    search_id: filing.search_id,
                    entity_id: filing.entity_id,
                    download_directory: target_dir.display().to_string(),
                    instance_file_path: instance_file,
                };

                DownloadedFiling::create(&self.pool, &new_filing).await?;
                FilingSearch::mark_completed(&self.pool, filing.search_id).await?;
            }
            WorkItem::Taxonomy(library) => {
                TaxonomyLibrary::mark_completed(
                    &self.pool,
                    library.library_id,
                    &target_dir.display().to_string(),
                    file_count as i32,
                )
                .await?;
            }
        }

        Ok(())
    }
}
