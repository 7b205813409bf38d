//! Parsed filing descriptor reader.
//!
//! The parser stage leaves a `parsed.json` at arbitrary depth under its
//! output root. This module discovers those files and extracts the declared
//! namespace URIs, filtering out the standard XML/XBRL namespaces that never
//! demand a library download.

use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use filing_hub_core::error::AppResult;
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT};

/// Filename produced by the parser stage
const PARSED_FILENAME: &str = "parsed.json";

/// Dotted paths checked for the prefix -> URI namespace map, in order
const NAMESPACE_SEARCH_PATHS: &[&str] = &[
    "instance.namespaces",
    "namespaces",
    "schema.namespaces",
    "metadata.namespaces",
    "xbrl.namespaces",
    "document.namespaces",
];

/// Standard namespaces that never become library requirements
const STANDARD_NAMESPACES: &[&str] = &[
    "http://www.w3.org/2001/XMLSchema",
    "http://www.w3.org/2001/XMLSchema-instance",
    "http://www.xbrl.org/2003/instance",
    "http://www.xbrl.org/2003/linkbase",
    "http://www.xbrl.org/2003/XLink",
    "http://www.xbrl.org/2006/xbrldi",
    "http://www.w3.org/1999/xlink",
    "http://www.w3.org/1999/xhtml",
    "http://www.w3.org/XML/1998/namespace",
];

/// One discovered parsed.json and its extracted namespaces
#[derive(Debug, Clone)]
pub struct ParsedFilingInfo {
    pub parsed_path: PathBuf,
    pub filing_folder: PathBuf,
    pub namespaces: HashSet<String>,
    pub success: bool,
    pub error: Option<String>,
}

/// A filing folder identified by its location under the parser output root
#[derive(Debug, Clone)]
pub struct ParsedFileLocation {
    pub filing_id: String,
    pub parsed_json_path: PathBuf,
}

/// Reads parsed.json descriptors and extracts taxonomy namespaces.
pub struct ParsedReader;

impl ParsedReader {
    pub fn new() -> Self {
        Self
    }

    /// Discover every parsed.json under `root`, at any depth.
    /// The filing id is the path from the root to the containing folder.
    pub fn discover_all(&self, root: &Path) -> Vec<ParsedFileLocation> {
        if !root.is_dir() {
            warn!("Parser output root does not exist: {}", root.display());
            return Vec::new();
        }

        let locations: Vec<ParsedFileLocation> = WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.file_name() == PARSED_FILENAME)
            .map(|entry| {
                let parsed_json_path = entry.into_path();
                let filing_id = parsed_json_path
                    .parent()
                    .and_then(|parent| parent.strip_prefix(root).ok())
                    .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_else(|| parsed_json_path.to_string_lossy().into_owned());

                ParsedFileLocation {
                    filing_id,
                    parsed_json_path,
                }
            })
            .collect();

        info!("{} Discovered {} parsed filings", LOG_OUTPUT, locations.len());
        locations
    }

    /// Read one parsed.json and extract its taxonomy namespaces
    pub fn read_file(&self, json_path: &Path) -> ParsedFilingInfo {
        debug!("{} Reading: {}", LOG_INPUT, json_path.display());

        let filing_folder = json_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let data: Value = match std::fs::read_to_string(json_path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| format!("Invalid JSON: {}", e)))
        {
            Ok(data) => data,
            Err(error) => {
                warn!("Error reading {}: {}", json_path.display(), error);
                return ParsedFilingInfo {
                    parsed_path: json_path.to_path_buf(),
                    filing_folder,
                    namespaces: HashSet::new(),
                    success: false,
                    error: Some(error),
                };
            }
        };

        let namespaces = filter_standard_namespaces(extract_namespaces(&data));

        debug!(
            "{} Extracted {} taxonomy namespaces",
            LOG_OUTPUT,
            namespaces.len()
        );

        ParsedFilingInfo {
            parsed_path: json_path.to_path_buf(),
            filing_folder,
            namespaces,
            success: true,
            error: None,
        }
    }

    /// Convenience: read all discovered descriptors under `root`
    pub fn read_all(&self, root: &Path) -> AppResult<Vec<(ParsedFileLocation, ParsedFilingInfo)>> {
        let locations = self.discover_all(root);

        Ok(locations
            .into_iter()
            .map(|location| {
                let info = self.read_file(&location.parsed_json_path);
                (location, info)
            })
            .collect())
    }
}

impl Default for ParsedReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract namespace URIs: the dotted search paths first, then a deep search
/// for any object that looks like a namespace map.
pub fn extract_namespaces(data: &Value) -> HashSet<String> {
    let mut namespaces = HashSet::new();

    for path in NAMESPACE_SEARCH_PATHS {
        if let Some(map) = value_at_path(data, path).and_then(Value::as_object) {
            for uri in map.values() {
                if let Some(uri) = uri.as_str() {
                    if !uri.is_empty() {
                        namespaces.insert(uri.to_string());
                    }
                }
            }
        }
    }

    if namespaces.is_empty() {
        deep_search_namespaces(data, &mut namespaces);
    }

    namespaces
}

fn value_at_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Recursive search for objects whose values are mostly http(s) URIs
fn deep_search_namespaces(data: &Value, found: &mut HashSet<String>) {
    match data {
        Value::Object(map) => {
            if is_namespace_map(map) {
                for value in map.values() {
                    if let Some(uri) = value.as_str() {
                        found.insert(uri.to_string());
                    }
                }
            }
            for value in map.values() {
                deep_search_namespaces(value, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                deep_search_namespaces(item, found);
            }
        }
        _ => {}
    }
}

/// An object is a namespace map when more than half its string values are
/// http(s) URIs
fn is_namespace_map(map: &serde_json::Map<String, Value>) -> bool {
    if map.is_empty() {
        return false;
    }

    let uri_count = map
        .values()
        .filter(|value| {
            value
                .as_str()
                .map(|s| s.starts_with("http://") || s.starts_with("https://"))
                .unwrap_or(false)
        })
        .count();

    (uri_count as f64 / map.len() as f64) > 0.5
}

fn filter_standard_namespaces(namespaces: HashSet<String>) -> HashSet<String> {
    namespaces
        .into_iter()
        .filter(|ns| !STANDARD_NAMESPACES.contains(&ns.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_search_paths() {
        // REQUIREMENT: Namespaces are read from the known descriptor paths
        // PURPOSE: Verify the dotted-path extraction and standard filtering
        let data = serde_json::json!({
            "instance": {
                "namespaces": {
                    "us-gaap": "http://fasb.org/us-gaap/2024",
                    "dei": "http://xbrl.sec.gov/dei/2024",
                    "xsi": "http://www.w3.org/2001/XMLSchema-instance"
                }
            }
        });

        let namespaces = filter_standard_namespaces(extract_namespaces(&data));

        assert_eq!(namespaces.len(), 2);
        assert!(namespaces.contains("http://fasb.org/us-gaap/2024"));
        assert!(!namespaces.contains("http://www.w3.org/2001/XMLSchema-instance"));
    }

    #[test]
    fn test_deep_search_fallback() {
        // REQUIREMENT: Without known paths, any >50%-URI object is a
        //              namespace map
        // PURPOSE: Verify the deep-search heuristic on nested structures
        let data = serde_json::json!({
            "report": {
                "sections": [
                    {
                        "prefix_map": {
                            "a": "http://fasb.org/us-gaap/2024",
                            "b": "https://xbrl.ifrs.org/taxonomy/full_ifrs/2024-03-27",
                            "note": "not a uri"
                        }
                    }
                ]
            }
        });

        let namespaces = extract_namespaces(&data);
        assert_eq!(namespaces.len(), 2);

        // An object with mostly non-URI values is not a namespace map
        let not_map = serde_json::json!({
            "config": {"name": "x", "count": "3", "link": "http://example.org/a"}
        });
        assert!(extract_namespaces(&not_map).is_empty());
    }

    #[test]
    fn test_discover_and_read() {
        // REQUIREMENT: parsed.json is found at arbitrary depth under the root
        // PURPOSE: Verify discovery, filing-id derivation, and file reading
        let tmp = tempfile::tempdir().unwrap();
        let filing_dir = tmp.path().join("sec/Apple_Inc/10-K/0000320193-24-000123");
        std::fs::create_dir_all(&filing_dir).unwrap();

        std::fs::write(
            filing_dir.join("parsed.json"),
            r#"{"namespaces": {"us-gaap": "http://fasb.org/us-gaap/2024"}}"#,
        )
        .unwrap();

        let reader = ParsedReader::new();
        let locations = reader.discover_all(tmp.path());

        assert_eq!(locations.len(), 1);
        assert_eq!(
            locations[0].filing_id,
            "sec/Apple_Inc/10-K/0000320193-24-000123"
        );

        let info = reader.read_file(&locations[0].parsed_json_path);
        assert!(info.success);
        assert!(info.namespaces.contains("http://fasb.org/us-gaap/2024"));
    }

    #[test]
    fn test_invalid_json() {
        // REQUIREMENT: Malformed descriptors fail gracefully per filing
        // PURPOSE: Verify the error surface without a panic
        let tmp = tempfile::tempdir().unwrap();
        let bad = tmp.path().join("parsed.json");
        std::fs::write(&bad, "definitely {not json").unwrap();

        let reader = ParsedReader::new();
        let info = reader.read_file(&bad);

        assert!(!info.success);
        assert!(info.error.unwrap().contains("Invalid JSON"));
        assert!(info.namespaces.is_empty());
    }
}
