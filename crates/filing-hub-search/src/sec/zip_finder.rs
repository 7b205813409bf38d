use tracing::{debug, warn};

use crate::sec::urls;

/// XBRL archive suffixes in priority order
const XBRL_ZIP_SUFFIXES: &[&str] = &["-xbrl.zip", "_htm.xml.zip", ".zip"];

/// Locates the XBRL ZIP inside a filing's index.json directory listing.
pub struct SecZipFinder;

impl SecZipFinder {
    /// Find the XBRL ZIP URL from parsed index.json data.
    ///
    /// Returns `None` when the directory holds no recognizable archive.
    pub fn find_xbrl_zip(
        index_data: &serde_json::Value,
        cik: &str,
        accession: &str,
    ) -> Option<String> {
        let items = index_data.get("directory")?.get("item")?.as_array()?;

        if items.is_empty() {
            warn!("No items found in index.json for {}", accession);
            return None;
        }

        let filenames: Vec<&str> = items
            .iter()
            .filter_map(|item| item.get("name").and_then(|n| n.as_str()))
            .collect();

        let zip_filename = Self::find_by_priority(&filenames)?;

        Some(urls::file_download_url(cik, accession, zip_filename))
    }

    /// Pick the best archive filename by suffix priority
    fn find_by_priority<'a>(filenames: &[&'a str]) -> Option<&'a str> {
        for suffix in XBRL_ZIP_SUFFIXES {
            for filename in filenames {
                if filename.ends_with(suffix) {
                    debug!("Found XBRL ZIP: {} (suffix: {})", filename, suffix);
                    return Some(filename);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_fixture(names: &[&str]) -> serde_json::Value {
        let items: Vec<serde_json::Value> =
            names.iter().map(|n| serde_json::json!({ "name": n })).collect();
        serde_json::json!({ "directory": { "item": items } })
    }

    #[test]
    fn test_prefers_xbrl_zip_suffix() {
        // REQUIREMENT: The XBRL archive is picked by priority suffix matching
        // PURPOSE: Verify -xbrl.zip wins over a plain .zip in the same directory
        let index = index_fixture(&[
            "aapl-20240928.htm",
            "0000320193-24-000123.zip",
            "0000320193-24-000123-xbrl.zip",
        ]);

        let url = SecZipFinder::find_xbrl_zip(&index, "0000320193", "0000320193-24-000123");
        assert_eq!(
            url.unwrap(),
            "https://www.sec.gov/Archives/edgar/data/320193/000032019324000123/0000320193-24-000123-xbrl.zip"
        );
    }

    #[test]
    fn test_falls_back_to_plain_zip() {
        // REQUIREMENT: Any .zip is acceptable when no XBRL-suffixed archive exists
        // PURPOSE: Verify the lowest-priority suffix still resolves
        let index = index_fixture(&["filing-data.zip", "cover.htm"]);

        let url = SecZipFinder::find_xbrl_zip(&index, "320193", "0000320193-24-000123");
        assert!(url.unwrap().ends_with("/filing-data.zip"));
    }

    #[test]
    fn test_no_archive_in_directory() {
        // REQUIREMENT: Directories without archives yield no URL, not an error
        // PURPOSE: Verify missing archives surface as None for the probe fallback
        let index = index_fixture(&["report.htm", "styles.css"]);
        assert!(SecZipFinder::find_xbrl_zip(&index, "320193", "acc").is_none());

        let empty = serde_json::json!({ "directory": { "item": [] } });
        assert!(SecZipFinder::find_xbrl_zip(&empty, "320193", "acc").is_none());

        let malformed = serde_json::json!({ "unexpected": true });
        assert!(SecZipFinder::find_xbrl_zip(&malformed, "320193", "acc").is_none());
    }
}
