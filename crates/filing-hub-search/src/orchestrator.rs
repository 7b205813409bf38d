use chrono::NaiveDate;
use tracing::{error, info, warn};
use uuid::Uuid;

use filing_hub_core::database::DatabasePool;
use filing_hub_core::error::AppResult;
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};
use filing_hub_core::models::{
    DownloadStatus, Entity, FilingSearch, NewEntity, NewFilingSearch, NewTaxonomyLibrary,
    TaxonomyLibrary, TaxonomySaveOutcome,
};
use filing_hub_core::Config;

use crate::registry::get_searcher;
use crate::searcher::FilingRecord;

/// Statistics for one orchestrated search batch
#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    pub results_found: usize,
    pub results_saved: usize,
    pub results_skipped: usize,
    pub results_failed: usize,
}

/// Runs market searches and persists the normalized results.
///
/// Searchers return `FilingRecord`s; the orchestrator owns all database
/// writes: entity upsert by `(market_type, market_entity_id)`, then one
/// filing-search row per result with both statuses `pending`.
pub struct SearchOrchestrator {
    pool: DatabasePool,
    config: Config,
}

impl SearchOrchestrator {
    pub fn new(pool: DatabasePool, config: Config) -> Self {
        Self { pool, config }
    }

    /// Search a market by identifier and persist the results
    pub async fn search_and_save(
        &self,
        market_id: &str,
        identifier: &str,
        form_type: &str,
        max_results: usize,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> AppResult<SearchStats> {
        info!(
            "{} Search request: {} / {} / {}",
            LOG_INPUT, market_id, identifier, form_type
        );

        let searcher = get_searcher(market_id, &self.config)?;

        let search_result = searcher
            .search_by_identifier(identifier, form_type, max_results, start_date, end_date)
            .await;

        searcher.close().await?;
        let results = search_result?;

        info!("{} Search returned {} results", LOG_OUTPUT, results.len());

        self.save_results(&results, identifier).await
    }

    /// Search a market by company name and persist the results
    pub async fn search_by_name_and_save(
        &self,
        market_id: &str,
        company_name: &str,
        form_type: &str,
        max_results: usize,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> AppResult<SearchStats> {
        info!(
            "{} Name search: {} / {} / {}",
            LOG_INPUT, market_id, company_name, form_type
        );

        let searcher = get_searcher(market_id, &self.config)?;

        let search_result = searcher
            .search_by_company_name(company_name, form_type, max_results, start_date, end_date)
            .await;

        searcher.close().await?;
        let results = search_result?;

        info!("{} Search returned {} results", LOG_OUTPUT, results.len());

        self.save_results(&results, company_name).await
    }

    /// Persist one batch of normalized results.
    ///
    /// Rows that already exist for `(entity_id, accession_number)` are
    /// counted as skipped, keeping repeat searches idempotent.
    async fn save_results(
        &self,
        results: &[FilingRecord],
        query_identifier: &str,
    ) -> AppResult<SearchStats> {
        info!("{} Saving {} results to database", LOG_PROCESS, results.len());

        let mut stats = SearchStats {
            results_found: results.len(),
            ..Default::default()
        };

        for record in results {
            let new_entity = NewEntity::active(
                &record.market_id,
                &record.entity_id,
                &record.company_name,
            );

            let entity = match Entity::find_or_create(&self.pool, &new_entity).await {
                Ok(entity) => entity,
                Err(e) => {
                    error!("Failed to upsert entity {}: {}", record.entity_id, e);
                    stats.results_failed += 1;
                    continue;
                }
            };

            let new_filing = NewFilingSearch {
                entity_id: entity.entity_id,
                market_type: record.market_id.clone(),
                form_type: record.form_type.clone(),
                filing_date: record.filing_date,
                filing_url: record.filing_url.clone(),
                accession_number: record.accession_number.clone(),
                search_metadata: serde_json::json!({
                    "company_name": record.company_name,
                    "market_entity_id": record.entity_id,
                    "query_identifier": query_identifier,
                }),
                download_status: DownloadStatus::Pending.to_string(),
                extraction_status: DownloadStatus::Pending.to_string(),
            };

            match FilingSearch::create(&self.pool, &new_filing).await {
                Ok(Some(_)) => stats.results_saved += 1,
                Ok(None) => {
                    // Already queued for this (entity, accession)
                    stats.results_skipped += 1;
                }
                Err(e) => {
                    error!("Failed to save filing {}: {}", record.accession_number, e);
                    stats.results_failed += 1;
                }
            }
        }

        info!(
            "{} Database save complete: {} saved, {} skipped, {} failed",
            LOG_OUTPUT, stats.results_saved, stats.results_skipped, stats.results_failed
        );

        Ok(stats)
    }

    /// Persist taxonomy library metadata.
    ///
    /// Called by the library module once a namespace resolves. Rows with
    /// a name or version of `unknown` are rejected as a no-op success.
    pub async fn save_taxonomy(
        &self,
        taxonomy_name: &str,
        taxonomy_version: &str,
        taxonomy_namespace: &str,
        source_url: &str,
        required_by_filing: Option<Uuid>,
    ) -> AppResult<TaxonomySaveOutcome> {
        info!(
            "{} Saving taxonomy: {}/{}",
            LOG_INPUT, taxonomy_name, taxonomy_version
        );

        let new_library = NewTaxonomyLibrary::pending(
            taxonomy_name,
            taxonomy_version,
            taxonomy_namespace,
            source_url,
            required_by_filing,
        );

        let outcome = TaxonomyLibrary::upsert(&self.pool, &new_library, required_by_filing).await?;

        if outcome.skipped {
            warn!(
                "{} Taxonomy skipped (unknown name or version): {}",
                LOG_OUTPUT, taxonomy_namespace
            );
        } else {
            info!(
                "{} Taxonomy saved: {}/{} (created={})",
                LOG_OUTPUT, taxonomy_name, taxonomy_version, outcome.created
            );
        }

        Ok(outcome)
    }
}
