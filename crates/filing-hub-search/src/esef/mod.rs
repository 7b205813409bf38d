//! ESEF/UKSEF market searcher backed by the filings.xbrl.org aggregator.
//!
//! The aggregator's JSON-API cannot filter by report type server-side, so
//! the form filter is applied client-side. The ZIP package (iXBRL plus the
//! extension taxonomy and linkbases) is preferred over the bare report.

pub mod client;
pub mod parser;
pub mod urls;

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info};

use filing_hub_core::error::AppResult;
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};
use filing_hub_core::Config;

use crate::searcher::{in_date_window, FilingRecord, MarketSearcher};
use self::client::EsefApiClient;
use self::parser::EsefResponseParser;

pub const MARKET_ID: &str = "esef";

/// Annual financial report, the default report type
pub const REPORT_TYPE_AFR: &str = "AFR";

/// LEIs are 20 characters: 18 alphanumerics plus 2 check digits
static LEI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{18}[0-9]{2}$").expect("valid LEI regex"));

pub fn is_lei(identifier: &str) -> bool {
    LEI_RE.is_match(&identifier.trim().to_uppercase())
}

pub struct EsefSearcher {
    client: EsefApiClient,
}

impl EsefSearcher {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = EsefApiClient::new(
            Duration::from_secs(config.http.request_timeout_seconds),
            config.retry.retry_attempts.max(1),
            Duration::from_secs(config.retry.retry_delay_seconds),
        )?;

        Ok(Self { client })
    }

    async fn search(
        &self,
        identifier: &str,
        form_type: &str,
        max_results: usize,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> AppResult<Vec<FilingRecord>> {
        let report_type = if form_type.trim().is_empty() {
            REPORT_TYPE_AFR.to_string()
        } else {
            form_type.trim().to_uppercase()
        };

        let lei = if is_lei(identifier) {
            info!("{} Searching by LEI: {}", LOG_PROCESS, identifier);
            Some(identifier.trim().to_uppercase())
        } else {
            info!("{} Searching by entity name: {}", LOG_PROCESS, identifier);
            None
        };

        let start = start_date.map(|d| d.to_string());
        let end = end_date.map(|d| d.to_string());

        let url = urls::filings_url(
            None,
            lei.as_deref(),
            start.as_deref(),
            end.as_deref(),
            max_results.max(1) * 2,
        );

        debug!("Fetching filings from: {}", url);
        let Some(response) = self.client.get_json(&url).await? else {
            return Ok(Vec::new());
        };

        let filings = EsefResponseParser::parse_filings_response(&response);

        let name_filter = lei.is_none().then(|| identifier.trim().to_lowercase());

        let mut results = Vec::new();
        for filing in filings {
            if results.len() >= max_results {
                break;
            }

            // Report type is encoded inside the filing index (fxo_id);
            // the API cannot filter it server-side
            if let Some(fxo_id) = &filing.fxo_id {
                if !fxo_id.to_uppercase().contains(&report_type) {
                    continue;
                }
            }

            if let Some(name_query) = &name_filter {
                let matches = filing
                    .entity_name
                    .as_ref()
                    .map(|n| n.to_lowercase().contains(name_query))
                    .unwrap_or(false);
                if !matches {
                    continue;
                }
            }

            let Some(period_end) = filing.period_end else { continue };
            if !in_date_window(period_end, start_date, end_date) {
                continue;
            }

            let Some(download_url) = EsefResponseParser::download_url(&filing) else {
                debug!("Filing {} has no downloadable artifact", filing.filing_id);
                continue;
            };

            let entity_lei = filing
                .entity_lei
                .clone()
                .unwrap_or_else(|| identifier.trim().to_uppercase());

            results.push(FilingRecord {
                filing_url: download_url,
                form_type: report_type.clone(),
                filing_date: period_end,
                company_name: filing
                    .entity_name
                    .clone()
                    .unwrap_or_else(|| entity_lei.clone()),
                entity_id: entity_lei,
                accession_number: filing
                    .fxo_id
                    .clone()
                    .unwrap_or_else(|| filing.filing_id.clone()),
                market_id: MARKET_ID.to_string(),
            });
        }

        Ok(results)
    }
}

#[async_trait]
impl MarketSearcher for EsefSearcher {
    async fn search_by_identifier(
        &self,
        identifier: &str,
        form_type: &str,
        max_results: usize,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> AppResult<Vec<FilingRecord>> {
        info!(
            "{} ESEF search: {} / {} / max={}",
            LOG_INPUT, identifier, form_type, max_results
        );

        let results = self
            .search(identifier, form_type, max_results, start_date, end_date)
            .await?;

        info!("{} ESEF search complete: {} results", LOG_OUTPUT, results.len());
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
        // LEI-shape detection inside search() handles both cases
        self.search_by_identifier(company_name, form_type, max_results, start_date, end_date)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_lei() {
        // REQUIREMENT: LEI-shaped identifiers query by entity identifier
        // PURPOSE: Verify the 20-character LEI pattern
        assert!(is_lei("2138002P5RNKC5W2JZ46"));
        assert!(is_lei("2138002p5rnkc5w2jz46"));
        assert!(!is_lei("Apple Inc."));
        assert!(!is_lei("2138002P5RNKC5W2JZ4"));
        assert!(!is_lei("2138002P5RNKC5W2JZ46X"));
    }
}
