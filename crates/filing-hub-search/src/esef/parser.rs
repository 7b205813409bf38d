use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::esef::urls;

/// One filing parsed out of a JSON-API response, with its entity resolved
/// from the `included` resources.
#[derive(Debug, Clone)]
pub struct EsefFiling {
    pub filing_id: String,
    pub fxo_id: Option<String>,
    pub country: Option<String>,
    pub date_added: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub report_url: Option<String>,
    pub package_url: Option<String>,
    pub entity_name: Option<String>,
    pub entity_lei: Option<String>,
}

/// Parses filings.xbrl.org JSON-API responses.
pub struct EsefResponseParser;

impl EsefResponseParser {
    /// Parse a filings list response, resolving entity relationships
    pub fn parse_filings_response(response: &Value) -> Vec<EsefFiling> {
        let Some(data) = response.get("data").and_then(|v| v.as_array()) else {
            return Vec::new();
        };

        let entity_lookup = Self::build_entity_lookup(response.get("included"));

        let filings: Vec<EsefFiling> = data
            .iter()
            .filter_map(|item| Self::parse_filing_item(item, &entity_lookup))
            .collect();

        debug!("Parsed {} filings", filings.len());
        filings
    }

    fn parse_filing_item(
        item: &Value,
        entity_lookup: &HashMap<String, (Option<String>, Option<String>)>,
    ) -> Option<EsefFiling> {
        let filing_id = item.get("id")?.as_str()?.to_string();
        let attrs = item.get("attributes")?;

        let str_attr =
            |key: &str| attrs.get(key).and_then(|v| v.as_str()).map(String::from);
        let date_attr = |key: &str| {
            attrs
                .get(key)
                .and_then(|v| v.as_str())
                // date_added may carry a time component
                .and_then(|s| s.get(..10))
                .and_then(|s| s.parse::<NaiveDate>().ok())
        };

        let mut filing = EsefFiling {
            filing_id,
            fxo_id: str_attr("fxo_id"),
            country: str_attr("country"),
            date_added: date_attr("date_added"),
            period_end: date_attr("period_end"),
            report_url: str_attr("report_url"),
            package_url: str_attr("package_url"),
            entity_name: None,
            entity_lei: None,
        };

        if let Some(entity_id) = item
            .pointer("/relationships/entity/data/id")
            .and_then(|v| v.as_str())
        {
            if let Some((name, lei)) = entity_lookup.get(entity_id) {
                filing.entity_name = name.clone();
                filing.entity_lei = lei.clone();
            } else {
                // The JSON-API id of an entity is typically its LEI
                filing.entity_lei = Some(entity_id.to_string());
            }
        }

        Some(filing)
    }

    /// Entity id -> (name, lei) from the `included` resources
    fn build_entity_lookup(
        included: Option<&Value>,
    ) -> HashMap<String, (Option<String>, Option<String>)> {
        let mut lookup = HashMap::new();

        let Some(items) = included.and_then(|v| v.as_array()) else {
            return lookup;
        };

        for item in items {
            if item.get("type").and_then(|v| v.as_str()) != Some("entity") {
                continue;
            }
            let Some(id) = item.get("id").and_then(|v| v.as_str()) else {
                continue;
            };

            let name = item
                .pointer("/attributes/name")
                .and_then(|v| v.as_str())
                .map(String::from);
            let lei = item
                .pointer("/attributes/identifier")
                .and_then(|v| v.as_str())
                .map(String::from)
                .or_else(|| Some(id.to_string()));

            lookup.insert(id.to_string(), (name, lei));
        }

        lookup
    }

    /// Best download URL for a filing: the ZIP package (iXBRL + extension
    /// taxonomy + linkbases) beats the bare iXBRL report.
    pub fn download_url(filing: &EsefFiling) -> Option<String> {
        if let Some(package_url) = &filing.package_url {
            if !package_url.is_empty() {
                return Some(urls::ensure_full_url(package_url));
            }
        }

        filing
            .report_url
            .as_ref()
            .filter(|u| !u.is_empty())
            .map(|u| urls::ensure_full_url(u))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_fixture() -> Value {
        serde_json::json!({
            "data": [
                {
                    "id": "filing-1",
                    "type": "filing",
                    "attributes": {
                        "fxo_id": "2138002P5RNKC5W2JZ46-2024-12-31-ESEF-GB-0",
                        "country": "GB",
                        "date_added": "2025-02-22 14:00:00",
                        "period_end": "2024-12-31",
                        "report_url": "/2138002P5RNKC5W2JZ46/2024-12-31/report.xhtml",
                        "package_url": "/2138002P5RNKC5W2JZ46/2024-12-31/package.zip"
                    },
                    "relationships": {
                        "entity": { "data": { "id": "ent-1", "type": "entity" } }
                    }
                },
                {
                    "id": "filing-2",
                    "type": "filing",
                    "attributes": {
                        "country": "DE",
                        "period_end": "2024-12-31",
                        "report_url": "/other/report.xhtml",
                        "package_url": ""
                    }
                }
            ],
            "included": [
                {
                    "id": "ent-1",
                    "type": "entity",
                    "attributes": {
                        "name": "Example Group plc",
                        "identifier": "2138002P5RNKC5W2JZ46"
                    }
                }
            ]
        })
    }

    #[test]
    fn test_parse_filings_with_entity_resolution() {
        // REQUIREMENT: Entity data rides in JSON-API included resources
        // PURPOSE: Verify filings resolve names/LEIs through the lookup
        let filings = EsefResponseParser::parse_filings_response(&response_fixture());

        assert_eq!(filings.len(), 2);
        assert_eq!(filings[0].entity_name.as_deref(), Some("Example Group plc"));
        assert_eq!(
            filings[0].entity_lei.as_deref(),
            Some("2138002P5RNKC5W2JZ46")
        );
        assert_eq!(
            filings[0].period_end,
            NaiveDate::from_ymd_opt(2024, 12, 31)
        );
        // date_added with a time component still parses
        assert_eq!(filings[0].date_added, NaiveDate::from_ymd_opt(2025, 2, 22));
    }

    #[test]
    fn test_download_url_prefers_package() {
        // REQUIREMENT: The ZIP package beats the bare iXBRL report URL
        // PURPOSE: Verify preference and relative-path resolution
        let filings = EsefResponseParser::parse_filings_response(&response_fixture());

        assert_eq!(
            EsefResponseParser::download_url(&filings[0]).unwrap(),
            "https://filings.xbrl.org/2138002P5RNKC5W2JZ46/2024-12-31/package.zip"
        );
        // Empty package_url falls back to report_url
        assert_eq!(
            EsefResponseParser::download_url(&filings[1]).unwrap(),
            "https://filings.xbrl.org/other/report.xhtml"
        );
    }

    #[test]
    fn test_empty_response() {
        // REQUIREMENT: Empty or malformed responses yield no filings
        // PURPOSE: Verify defensive parsing of the data array
        assert!(EsefResponseParser::parse_filings_response(&serde_json::json!({})).is_empty());
        assert!(EsefResponseParser::parse_filings_response(&serde_json::json!({"data": []}))
            .is_empty());
    }
}
