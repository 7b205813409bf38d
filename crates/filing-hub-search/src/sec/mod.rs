//! SEC EDGAR market searcher.
//!
//! Workflow: resolve identifier to CIK via the ticker index, fetch the
//! submissions document, filter the recent-filings arrays by form and date
//! window, then locate the XBRL archive for each match either through the
//! published index.json or by probing fixed suffix patterns.

pub mod client;
pub mod lookup;
pub mod models;
pub mod urls;
pub mod zip_finder;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::{debug, info, warn};

use filing_hub_core::error::AppResult;
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};
use filing_hub_core::Config;

use crate::searcher::{in_date_window, FilingRecord, MarketSearcher};
use self::client::SecApiClient;
use self::lookup::SecCompanyLookup;
use self::models::CompanySubmissions;
use self::zip_finder::SecZipFinder;

pub const MARKET_ID: &str = "sec";

pub struct SecSearcher {
    client: SecApiClient,
    lookup: SecCompanyLookup,
}

impl SecSearcher {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = SecApiClient::new(
            &config.credentials.sec_user_agent,
            Duration::from_secs(config.http.request_timeout_seconds),
        )?;

        Ok(Self {
            client,
            lookup: SecCompanyLookup::new(),
        })
    }

    /// Find the XBRL archive URL for one filing.
    ///
    /// index.json is preferred; filings whose index document is missing or
    /// served as HTML fall through to suffix-pattern probing with HEAD
    /// validation.
    async fn find_zip_url(&self, cik: &str, accession: &str) -> AppResult<Option<String>> {
        let index_url = urls::filing_index_url(cik, accession);

        if let Some(index_data) = self.client.get_json_optional(&index_url).await? {
            if let Some(zip_url) = SecZipFinder::find_xbrl_zip(&index_data, cik, accession) {
                return Ok(Some(zip_url));
            }
        }

        debug!("No usable index.json, probing URL patterns for {}", accession);
        for candidate in urls::xbrl_zip_candidates(cik, accession) {
            if self.client.check_url_exists(&candidate).await {
                info!("Found ZIP via URL validation: {}", candidate);
                return Ok(Some(candidate));
            }
        }

        debug!("No XBRL ZIP found for {} after checking all patterns", accession);
        Ok(None)
    }
}

#[async_trait]
impl MarketSearcher for SecSearcher {
    async fn search_by_identifier(
        &self,
        identifier: &str,
        form_type: &str,
        max_results: usize,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> AppResult<Vec<FilingRecord>> {
        info!(
            "{} SEC search: {} / {} / max={}",
            LOG_INPUT, identifier, form_type, max_results
        );

        let form_normalized = urls::normalize_form_type(form_type);

        let cik = self.lookup.resolve_identifier(&self.client, identifier).await?;
        info!("{} Resolved to CIK: {}", LOG_PROCESS, cik);

        let submissions: CompanySubmissions =
            self.client.get_json(&urls::submissions_url(&cik)).await?;

        let company_name = submissions.name.clone();
        let recent = &submissions.filings.recent;

        let mut results = Vec::new();

        for (i, accession) in recent.accession_number.iter().enumerate() {
            if results.len() >= max_results {
                break;
            }

            let Some(form) = recent.form.get(i) else { continue };
            if form != &form_normalized {
                continue;
            }

            let Some(date_str) = recent.filing_date.get(i) else { continue };
            let Ok(filing_date) = date_str.parse::<NaiveDate>() else {
                warn!("Unparseable filing date: {}", date_str);
                continue;
            };
            if !in_date_window(filing_date, start_date, end_date) {
                continue;
            }

            if !recent.has_xbrl(i) {
                continue;
            }

            match self.find_zip_url(&cik, accession).await {
                Ok(Some(zip_url)) => {
                    results.push(FilingRecord {
                        filing_url: zip_url,
                        form_type: form.clone(),
                        filing_date,
                        company_name: company_name.clone(),
                        entity_id: cik.clone(),
                        accession_number: accession.clone(),
                        market_id: MARKET_ID.to_string(),
                    });
                }
                Ok(None) => {
                    debug!("No XBRL ZIP for {}, skipping", accession);
                }
                Err(e) => {
                    warn!("Failed to locate archive for {}: {}", accession, e);
                }
            }
        }

        info!("{} SEC search complete: {} results", LOG_OUTPUT, results.len());
        Ok(results)
    }

    async fn search_by_company_name(
        &self,
        company_name: &str,
        form_type: &str,
        max_results: usize,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> AppResult<Vec<FilingRecord>> {
        // The identifier path resolves names through the ticker index
        self.search_by_identifier(company_name, form_type, max_results, start_date, end_date)
            .await
    }
}
