//! Retry escalation for failed library acquisitions.
//!
//! Runs periodically over failed, non-terminal libraries and escalates:
//! retry the same URL, switch to an alternative URL, or surface a
//! manual-intervention report, depending on the failure reason.

use tracing::{error, info, warn};

use filing_hub_core::database::DatabasePool;
use filing_hub_core::error::AppResult;
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};
use filing_hub_core::models::taxonomy_library::MAX_TOTAL_ATTEMPTS;
use filing_hub_core::models::TaxonomyLibrary;

use crate::resolver::NamespaceResolver;

/// Per-stage attempt ceilings before escalation
pub const MAX_DOWNLOAD_ATTEMPTS: i32 = 3;
pub const MAX_EXTRACTION_ATTEMPTS: i32 = 3;

/// Escalation strategy chosen for a failed library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    RetrySameUrl,
    TryAlternativeUrl,
    ManualIntervention,
}

/// Summary of one monitor pass
#[derive(Debug, Clone, Default)]
pub struct MonitorSummary {
    pub pending_retries: usize,
    pub permanent_failures: usize,
    pub requeued_same_url: usize,
    pub switched_alternative: usize,
    pub manual_interventions: usize,
}

/// Decide the strategy for a failure reason and attempt counts.
///
/// URL-level and transient failures retry the same URL until the download
/// ceiling, then switch; repeated extraction failures switch sources;
/// system problems go straight to manual intervention.
pub fn determine_retry_strategy(
    failure_reason: &str,
    download_attempts: i32,
    extraction_attempts: i32,
) -> RetryStrategy {
    const URL_FAILURES: &[&str] = &["invalid_url", "url_404", "url_403", "dns_error"];
    const TRANSIENT_FAILURES: &[&str] = &["network_error", "timeout", "incomplete_download"];
    const EXTRACTION_FAILURES: &[&str] = &["corrupted_zip", "invalid_archive"];
    const SYSTEM_FAILURES: &[&str] = &["permission_denied", "disk_full", "extraction_error"];

    if URL_FAILURES.contains(&failure_reason) || TRANSIENT_FAILURES.contains(&failure_reason) {
        if download_attempts >= MAX_DOWNLOAD_ATTEMPTS {
            return RetryStrategy::TryAlternativeUrl;
        }
        return RetryStrategy::RetrySameUrl;
    }

    if EXTRACTION_FAILURES.contains(&failure_reason) {
        if extraction_attempts >= 2 {
            return RetryStrategy::TryAlternativeUrl;
        }
        // Re-download first; the archive may have been truncated in flight
        return RetryStrategy::RetrySameUrl;
    }

    if SYSTEM_FAILURES.contains(&failure_reason) {
        return RetryStrategy::ManualIntervention;
    }

    RetryStrategy::RetrySameUrl
}

/// Escalates failed library downloads through the retry ladder.
pub struct RetryMonitor {
    pool: DatabasePool,
    resolver: NamespaceResolver,
    manual_downloads_dir: std::path::PathBuf,
}

impl RetryMonitor {
    pub fn new(pool: DatabasePool, manual_downloads_dir: &std::path::Path) -> Self {
        info!("{} RetryMonitor initialized", LOG_INPUT);

        Self {
            pool,
            resolver: NamespaceResolver::new(),
            manual_downloads_dir: manual_downloads_dir.to_path_buf(),
        }
    }

    /// One monitoring pass: handle every retryable failure and report the
    /// terminal ones.
    pub async fn monitor_download_results(&self) -> AppResult<MonitorSummary> {
        info!("{} Monitoring download results", LOG_PROCESS);

        let retryable = TaxonomyLibrary::get_retry_candidates(&self.pool).await?;
        let terminal = TaxonomyLibrary::get_terminal_failures(&self.pool).await?;

        info!(
            "{} Found {} pending retries, {} permanent failures",
            LOG_OUTPUT,
            retryable.len(),
            terminal.len()
        );

        let mut summary = MonitorSummary {
            pending_retries: retryable.len(),
            permanent_failures: terminal.len(),
            ..Default::default()
        };

        for library in &retryable {
            match self.handle_retry(library).await {
                Ok(strategy) => match strategy {
                    RetryStrategy::RetrySameUrl => summary.requeued_same_url += 1,
                    RetryStrategy::TryAlternativeUrl => summary.switched_alternative += 1,
                    RetryStrategy::ManualIntervention => summary.manual_interventions += 1,
                },
                Err(e) => error!(
                    "Retry handling failed for {} v{}: {}",
                    library.taxonomy_name, library.taxonomy_version, e
                ),
            }
        }

        for library in &terminal {
            self.report_persistent_failure(library);
        }

        Ok(summary)
    }

    async fn handle_retry(&self, library: &TaxonomyLibrary) -> AppResult<RetryStrategy> {
        let reason = library.failure_reason.as_deref().unwrap_or("unknown");
        let strategy = determine_retry_strategy(
            reason,
            library.download_attempts,
            library.extraction_attempts,
        );

        info!(
            "{} Handling retry for {} v{}: reason={} strategy={:?}",
            LOG_PROCESS, library.taxonomy_name, library.taxonomy_version, reason, strategy
        );

        match strategy {
            RetryStrategy::RetrySameUrl => {
                // Reset to pending; the downloader picks it up next run
                TaxonomyLibrary::requeue_pending(&self.pool, library.library_id).await?;

                info!(
                    "{} Queued {} v{} for retry (same URL)",
                    LOG_OUTPUT, library.taxonomy_name, library.taxonomy_version
                );
            }
            RetryStrategy::TryAlternativeUrl => {
                let tried = library.urls_tried();
                let candidates = self.resolver.alternative_urls(
                    &library.taxonomy_name,
                    &library.taxonomy_version,
                    &library.taxonomy_namespace,
                );

                let next = candidates
                    .into_iter()
                    .find(|url| url != &library.current_url && !tried.contains(url));

                match next {
                    Some(next_url) => {
                        TaxonomyLibrary::switch_to_alternative_url(
                            &self.pool,
                            library.library_id,
                            &next_url,
                        )
                        .await?;

                        info!(
                            "{} Switched {} v{} to alternative URL: {}",
                            LOG_OUTPUT, library.taxonomy_name, library.taxonomy_version, next_url
                        );
                    }
                    None => {
                        warn!(
                            "No alternative URL available for {} v{}",
                            library.taxonomy_name, library.taxonomy_version
                        );
                        TaxonomyLibrary::mark_failed(
                            &self.pool,
                            library.library_id,
                            "download",
                            "no_alternative_url",
                            "All URLs exhausted, no alternatives available",
                        )
                        .await?;
                        self.report_manual_download_needed(library);
                    }
                }
            }
            RetryStrategy::ManualIntervention => {
                self.report_manual_intervention(library);
            }
        }

        Ok(strategy)
    }

    fn report_persistent_failure(&self, library: &TaxonomyLibrary) {
        error!(
            "PERSISTENT FAILURE: {} v{} failed after {} attempts",
            library.taxonomy_name, library.taxonomy_version, library.total_attempts
        );

        let urls_tried = library
            .urls_tried()
            .iter()
            .map(|url| format!("  - {}", url))
            .collect::<Vec<_>>()
            .join("\n");

        let report = format!(
            "{border}\nPERSISTENT DOWNLOAD FAILURE - MANUAL DOWNLOAD REQUIRED\n{border}\n\n\
             Library: {name} v{version}\n\
             Attempts: {attempts} (max {max})\n\
             Last failure: {stage} - {reason}\n\n\
             URLs tried:\n  - {current}\n{tried}\n\n\
             Manual download instructions:\n\
             1. Search online for: \"{name} {version} taxonomy download\"\n\
             2. Download the ZIP file from the official source\n\
             3. Place it in: {manual_dir}\n\
             4. Run: library --manual\n\
             {border}",
            border = "=".repeat(80),
            name = library.taxonomy_name,
            version = library.taxonomy_version,
            attempts = library.total_attempts,
            max = MAX_TOTAL_ATTEMPTS,
            stage = library.failure_stage.as_deref().unwrap_or("unknown"),
            reason = library.failure_reason.as_deref().unwrap_or("unknown"),
            current = library.current_url,
            tried = urls_tried,
            manual_dir = self.manual_downloads_dir.display(),
        );

        println!("{}", report);
        error!("{}", report);
    }

    fn report_manual_download_needed(&self, library: &TaxonomyLibrary) {
        warn!(
            "MANUAL DOWNLOAD NEEDED: {} v{} - all automatic attempts exhausted",
            library.taxonomy_name, library.taxonomy_version
        );

        println!(
            "\nAll automatic download URLs failed for {} v{}.\n\
             Namespace: {}\n\
             Place a manually downloaded archive in {} and run: library --manual\n",
            library.taxonomy_name,
            library.taxonomy_version,
            library.taxonomy_namespace,
            self.manual_downloads_dir.display(),
        );
    }

    fn report_manual_intervention(&self, library: &TaxonomyLibrary) {
        let reason = library.failure_reason.as_deref().unwrap_or("unknown");

        error!(
            "MANUAL INTERVENTION: {} v{} - system issue: {}",
            library.taxonomy_name, library.taxonomy_version, reason
        );

        let instructions = match reason {
            "permission_denied" => {
                "Check file permissions on the taxonomy directories\n(the library process needs write access)."
            }
            "disk_full" => "Free up disk space on the data volume (df -h), then rerun --scan.",
            _ => "Check the logs for details, fix the system issue, then rerun --scan.",
        };

        println!(
            "\n{border}\nMANUAL INTERVENTION REQUIRED\n{border}\n\n\
             Library: {} v{}\nIssue: {}\n\n{}\n{border}\n",
            library.taxonomy_name,
            library.taxonomy_version,
            reason,
            instructions,
            border = "=".repeat(80),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_failures_follow_retry_ladder() {
        // REQUIREMENT: URL-level failures retry the same URL, then escalate
        //              to alternatives once the download ceiling is hit
        // PURPOSE: Verify the ladder for each URL failure reason
        for reason in ["invalid_url", "url_404", "url_403", "dns_error"] {
            assert_eq!(
                determine_retry_strategy(reason, 1, 0),
                RetryStrategy::RetrySameUrl
            );
            assert_eq!(
                determine_retry_strategy(reason, MAX_DOWNLOAD_ATTEMPTS, 0),
                RetryStrategy::TryAlternativeUrl
            );
        }
    }

    #[test]
    fn test_transient_failures_follow_same_ladder() {
        // REQUIREMENT: Transient network failures share the URL-level ladder
        // PURPOSE: Verify network/timeout/incomplete reasons
        for reason in ["network_error", "timeout", "incomplete_download"] {
            assert_eq!(
                determine_retry_strategy(reason, 2, 0),
                RetryStrategy::RetrySameUrl
            );
            assert_eq!(
                determine_retry_strategy(reason, 4, 0),
                RetryStrategy::TryAlternativeUrl
            );
        }
    }

    #[test]
    fn test_extraction_failures_switch_after_two() {
        // REQUIREMENT: Repeated corrupt archives mean the source is bad;
        //              switch after two extraction attempts
        // PURPOSE: Verify the extraction-specific escalation
        for reason in ["corrupted_zip", "invalid_archive"] {
            assert_eq!(
                determine_retry_strategy(reason, 0, 1),
                RetryStrategy::RetrySameUrl
            );
            assert_eq!(
                determine_retry_strategy(reason, 0, 2),
                RetryStrategy::TryAlternativeUrl
            );
        }
    }

    #[test]
    fn test_system_failures_need_manual_intervention() {
        // REQUIREMENT: System problems cannot be retried away
        // PURPOSE: Verify permission/disk/extraction-system reasons
        for reason in ["permission_denied", "disk_full", "extraction_error"] {
            assert_eq!(
                determine_retry_strategy(reason, 0, 0),
                RetryStrategy::ManualIntervention
            );
        }
    }

    #[test]
    fn test_unknown_reason_defaults_to_retry() {
        // REQUIREMENT: Unclassified reasons default to retrying the same URL
        // PURPOSE: Verify the default branch
        assert_eq!(
            determine_retry_strategy("something_new", 0, 0),
            RetryStrategy::RetrySameUrl
        );
    }
}
