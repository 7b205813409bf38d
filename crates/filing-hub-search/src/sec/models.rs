use serde::Deserialize;
use std::collections::HashMap;

/// Company submissions response from `data.sec.gov/submissions/CIK{cik}.json`.
///
/// Field names are the SEC API contract; the recent filings arrive as
/// parallel arrays indexed together.
#[derive(Debug, Clone, Deserialize)]
pub struct CompanySubmissions {
    pub name: String,
    #[serde(default)]
    pub tickers: Vec<String>,
    pub filings: SubmissionFilings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionFilings {
    pub recent: RecentFilings,
}

/// Parallel arrays of recent filing metadata
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFilings {
    #[serde(default)]
    pub accession_number: Vec<String>,
    #[serde(default)]
    pub filing_date: Vec<String>,
    #[serde(default)]
    pub form: Vec<String>,
    #[serde(default)]
    pub primary_document: Vec<String>,
    #[serde(rename = "isXBRL", default)]
    pub is_xbrl: Vec<u8>,
}

impl RecentFilings {
    /// Whether the filing at `index` carries XBRL data.
    /// Missing flags are treated as XBRL-bearing, matching the probe-anyway
    /// behavior for older submissions documents.
    pub fn has_xbrl(&self, index: usize) -> bool {
        self.is_xbrl.get(index).map(|flag| *flag == 1).unwrap_or(true)
    }
}

/// One row of the `company_tickers.json` index
#[derive(Debug, Clone, Deserialize)]
pub struct TickerEntry {
    pub cik_str: u64,
    pub ticker: String,
    pub title: String,
}

/// The full ticker index keyed by arbitrary string offsets
pub type TickerIndex = HashMap<String, TickerEntry>;
