//! UK Companies House market searcher.
//!
//! Accounts filings are iXBRL documents served by the Document API. The
//! searcher validates the company number, walks the accounts filing history,
//! and points each result at the document's `/content` URL with the
//! iXBRL-first format ladder recorded for the downloader.

pub mod client;
pub mod filing_finder;
pub mod lookup;
pub mod urls;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::{info, warn};

use filing_hub_core::error::{AppError, AppResult};
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};
use filing_hub_core::Config;

use crate::searcher::{FilingRecord, MarketSearcher};
use self::client::UkApiClient;
use self::filing_finder::UkFilingFinder;

pub const MARKET_ID: &str = "uk_frc";

pub struct UkSearcher {
    client: UkApiClient,
}

impl UkSearcher {
    pub fn new(config: &Config) -> AppResult<Self> {
        let api_key = config.credentials.uk_ch_api_key.clone().ok_or_else(|| {
            AppError::ConfigError("UK Companies House API key not configured".to_string())
        })?;

        let client = UkApiClient::new(
            &api_key,
            &config.credentials.uk_ch_user_agent,
            Duration::from_secs(config.http.request_timeout_seconds),
        )?;

        Ok(Self { client })
    }

    async fn company_name(&self, company_number: &str) -> String {
        match self
            .client
            .get_json(&urls::company_profile_url(company_number))
            .await
        {
            Ok(Some(profile)) => profile
                .get("company_name")
                .and_then(|v| v.as_str())
                .unwrap_or(company_number)
                .to_string(),
            _ => company_number.to_string(),
        }
    }
}

#[async_trait]
impl MarketSearcher for UkSearcher {
    async fn search_by_identifier(
        &self,
        identifier: &str,
        form_type: &str,
        max_results: usize,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> AppResult<Vec<FilingRecord>> {
        info!(
            "{} UK search: {} / {} / max={}",
            LOG_INPUT, identifier, form_type, max_results
        );

        if !lookup::validate_format(identifier) {
            return Err(AppError::SearchError(format!(
                "Invalid company number: {}",
                identifier
            )));
        }

        let company_number = lookup::normalize(identifier);
        info!("{} Normalized company number: {}", LOG_PROCESS, company_number);

        let company_name = self.company_name(&company_number).await;

        let filing_type = if form_type.trim().is_empty() {
            None
        } else {
            Some(form_type.trim())
        };

        let filings = UkFilingFinder::find_accounts_filings(
            &self.client,
            &company_number,
            filing_type,
            start_date,
            end_date,
            max_results,
        )
        .await?;

        let results: Vec<FilingRecord> = filings
            .into_iter()
            .map(|filing| FilingRecord {
                filing_url: filing.download_url,
                form_type: filing.filing_type,
                filing_date: filing.filing_date,
                company_name: company_name.clone(),
                entity_id: company_number.clone(),
                accession_number: filing.transaction_id,
                market_id: MARKET_ID.to_string(),
            })
            .collect();

        info!("{} UK search complete: {} results", LOG_OUTPUT, results.len());
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
        info!("{} UK name search: {}", LOG_INPUT, company_name);

        let Some(search_result) = self
            .client
            .get_json(&urls::company_search_url(company_name, 5))
            .await?
        else {
            return Ok(Vec::new());
        };

        let Some(company_number) = search_result
            .pointer("/items/0/company_number")
            .and_then(|v| v.as_str())
        else {
            warn!("No company found for name: {}", company_name);
            return Ok(Vec::new());
        };

        self.search_by_identifier(company_number, form_type, max_results, start_date, end_date)
            .await
    }
}
