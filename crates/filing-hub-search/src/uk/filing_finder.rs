use chrono::NaiveDate;
use tracing::{debug, info, warn};

use filing_hub_core::error::AppResult;

use crate::searcher::in_date_window;
use crate::uk::client::UkApiClient;
use crate::uk::urls;

/// Document format preference ladder: iXBRL first, PDF last
pub const FORMAT_PRIORITY: &[&str] = &[
    "application/xhtml+xml",
    "application/xml",
    "application/pdf",
];

/// One accounts filing with its resolved document download target
#[derive(Debug, Clone)]
pub struct UkAccountsFiling {
    pub transaction_id: String,
    pub filing_type: String,
    pub filing_date: NaiveDate,
    pub document_id: String,
    pub download_url: String,
    pub preferred_format: Option<String>,
}

/// Finds accounts filings and resolves their document download URLs.
pub struct UkFilingFinder;

impl UkFilingFinder {
    /// Fetch the accounts filing history and enrich each item with its
    /// document id, preferred format, and `/content` download URL.
    pub async fn find_accounts_filings(
        client: &UkApiClient,
        company_number: &str,
        filing_type: Option<&str>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        limit: usize,
    ) -> AppResult<Vec<UkAccountsFiling>> {
        let history_url =
            urls::filing_history_url(company_number, urls::CATEGORY_ACCOUNTS, 100);

        let Some(history) = client.get_json(&history_url).await? else {
            warn!("No filing history for {}", company_number);
            return Ok(Vec::new());
        };

        let items = history
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        debug!("Found {} accounts filing items", items.len());

        let mut filings = Vec::new();

        for item in items {
            if filings.len() >= limit {
                break;
            }

            let item_type = item.get("type").and_then(|v| v.as_str()).unwrap_or("");
            if let Some(wanted) = filing_type {
                if item_type != wanted {
                    continue;
                }
            }

            let Some(date) = item
                .get("date")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<NaiveDate>().ok())
            else {
                continue;
            };
            if !in_date_window(date, start_date, end_date) {
                continue;
            }

            let Some(metadata_link) = item
                .pointer("/links/document_metadata")
                .and_then(|v| v.as_str())
            else {
                debug!("Filing item without document_metadata link, skipping");
                continue;
            };

            let Some(document_id) = urls::extract_document_id(metadata_link) else {
                continue;
            };

            let transaction_id = item
                .get("transaction_id")
                .and_then(|v| v.as_str())
                .unwrap_or(&document_id)
                .to_string();

            // Document metadata tells us which formats the server can render
            let preferred_format = match client
                .get_json(&urls::document_metadata_url(&document_id))
                .await
            {
                Ok(Some(metadata)) => Self::preferred_format(&metadata),
                Ok(None) => None,
                Err(e) => {
                    warn!("Failed to get document metadata for {}: {}", document_id, e);
                    None
                }
            };

            filings.push(UkAccountsFiling {
                transaction_id,
                filing_type: item_type.to_string(),
                filing_date: date,
                download_url: urls::document_content_url(&document_id),
                document_id,
                preferred_format,
            });
        }

        info!("After filtering: {} accounts filings", filings.len());
        Ok(filings)
    }

    /// Pick the best available format from document metadata resources
    pub fn preferred_format(metadata: &serde_json::Value) -> Option<String> {
        let resources = metadata.get("resources")?.as_object()?;

        FORMAT_PRIORITY
            .iter()
            .find(|format| resources.contains_key(**format))
            .map(|format| format.to_string())
    }
}
