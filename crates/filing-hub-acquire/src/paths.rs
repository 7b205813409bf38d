use std::path::{Path, PathBuf};
use tracing::debug;

use filing_hub_core::models::{DownloadableFiling, TaxonomyLibrary};

/// Subdirectory under each company holding its filings
const FILINGS_SUBDIRECTORY: &str = "filings";

const UNKNOWN_COMPANY_NAME: &str = "UNKNOWN";

/// One unit of download work taken from the queue: either a pending filing
/// search or a pending taxonomy library.
#[derive(Debug, Clone)]
pub enum WorkItem {
    Filing(DownloadableFiling),
    Taxonomy(TaxonomyLibrary),
}

impl WorkItem {
    /// URL the coordinator should fetch for this item
    pub fn url(&self) -> &str {
        match self {
            WorkItem::Filing(filing) => &filing.filing_url,
            WorkItem::Taxonomy(library) => &library.current_url,
        }
    }

    /// Human-readable label for logs and the CLI
    pub fn label(&self) -> String {
        match self {
            WorkItem::Filing(filing) => {
                format!("{} / {} / {}", filing.company_name, filing.form_type, filing.filing_date)
            }
            WorkItem::Taxonomy(library) => {
                format!("{} v{}", library.taxonomy_name, library.taxonomy_version)
            }
        }
    }
}

/// Computes on-disk layout for filings and taxonomy libraries.
///
/// Filings:    `{entities_root}/{market}/{safe_company}/filings/{form}/{accession}`
/// Taxonomies: `{taxonomies_root}/{name}/{version}`
///
/// Returned paths are always absolute.
pub struct PathResolver {
    entities_dir: PathBuf,
    taxonomies_dir: PathBuf,
}

impl PathResolver {
    pub fn new(entities_dir: &Path, taxonomies_dir: &Path) -> Self {
        Self {
            entities_dir: absolute(entities_dir),
            taxonomies_dir: absolute(taxonomies_dir),
        }
    }

    /// Target directory for a work item
    pub fn target_dir(&self, item: &WorkItem) -> PathBuf {
        match item {
            WorkItem::Filing(filing) => self.filing_path(filing),
            WorkItem::Taxonomy(library) => self.taxonomy_path(library),
        }
    }

    pub fn filing_path(&self, filing: &DownloadableFiling) -> PathBuf {
        let company = if filing.company_name.is_empty() {
            UNKNOWN_COMPANY_NAME.to_string()
        } else {
            normalize_company_name(&filing.company_name)
        };

        let target = self
            .entities_dir
            .join(filing.market_type.to_lowercase())
            .join(company)
            .join(FILINGS_SUBDIRECTORY)
            .join(&filing.form_type)
            .join(&filing.accession_number);

        debug!("Built filing directory path: {}", target.display());
        target
    }

    pub fn taxonomy_path(&self, library: &TaxonomyLibrary) -> PathBuf {
        let target = self
            .taxonomies_dir
            .join(&library.taxonomy_name)
            .join(&library.taxonomy_version);

        debug!("Built taxonomy directory path: {}", target.display());
        target
    }

    pub fn taxonomies_root(&self) -> &Path {
        &self.taxonomies_dir
    }
}

/// Normalize a company name for filesystem use: separators collapse to `_`,
/// everything outside `[A-Za-z0-9_]` is dropped.
pub fn normalize_company_name(company_name: &str) -> String {
    let mut safe = String::with_capacity(company_name.len());
    let mut last_was_separator = false;

    for c in company_name.chars() {
        if c.is_ascii_alphanumeric() {
            safe.push(c);
            last_was_separator = false;
        } else if (c == ' ' || c == '_' || c == '-' || c == '/' || c == '\\' || c == '.')
            && !last_was_separator
            && !safe.is_empty()
        {
            safe.push('_');
            last_was_separator = true;
        }
    }

    safe.trim_end_matches('_').to_string()
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn sample_filing() -> DownloadableFiling {
        DownloadableFiling {
            search_id: Uuid::new_v4(),
            entity_id: Uuid::new_v4(),
            market_type: "SEC".to_string(),
            form_type: "10-K".to_string(),
            filing_date: NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            filing_url: "https://www.sec.gov/x.zip".to_string(),
            accession_number: "0000320193-24-000123".to_string(),
            download_status: "pending".to_string(),
            company_name: "Apple Inc.".to_string(),
        }
    }

    fn sample_library() -> TaxonomyLibrary {
        TaxonomyLibrary {
            library_id: Uuid::new_v4(),
            taxonomy_name: "us-gaap".to_string(),
            taxonomy_version: "2024".to_string(),
            taxonomy_namespace: "http://fasb.org/us-gaap/2024".to_string(),
            source_url: "https://xbrl.fasb.org/us-gaap/2024/us-gaap-2024.zip".to_string(),
            current_url: "https://xbrl.fasb.org/us-gaap/2024/us-gaap-2024.zip".to_string(),
            download_status: "pending".to_string(),
            library_directory: None,
            total_files: None,
            download_attempts: 0,
            extraction_attempts: 0,
            total_attempts: 0,
            failure_stage: None,
            failure_reason: None,
            error_message: None,
            alternative_urls_tried: serde_json::json!([]),
            required_by_filings: serde_json::json!([]),
            download_completed_at: None,
            last_verified_at: None,
            is_terminal: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_normalize_company_name() {
        // REQUIREMENT: Company names become [A-Za-z0-9_] with separators
        //              collapsed to underscores
        // PURPOSE: Verify the normalization rules on awkward names
        assert_eq!(normalize_company_name("Apple Inc."), "Apple_Inc");
        assert_eq!(normalize_company_name("AT&T CORP"), "ATT_CORP");
        assert_eq!(normalize_company_name("Smith / Jones  Ltd"), "Smith_Jones_Ltd");
        assert_eq!(normalize_company_name("Über GmbH"), "ber_GmbH");
        assert_eq!(normalize_company_name("---"), "");
    }

    #[test]
    fn test_filing_path() {
        // REQUIREMENT: Filing layout is {entities}/{market}/{company}/filings/{form}/{accession}
        // PURPOSE: Verify the exact directory shape
        let resolver = PathResolver::new(Path::new("/data/entities"), Path::new("/data/taxonomies"));
        let path = resolver.filing_path(&sample_filing());

        assert_eq!(
            path,
            PathBuf::from("/data/entities/sec/Apple_Inc/filings/10-K/0000320193-24-000123")
        );
        assert!(path.is_absolute());
    }

    #[test]
    fn test_taxonomy_path() {
        // REQUIREMENT: Taxonomy layout is {taxonomies}/{name}/{version}
        // PURPOSE: Verify the directory shape
        let resolver = PathResolver::new(Path::new("/data/entities"), Path::new("/data/taxonomies"));
        let path = resolver.taxonomy_path(&sample_library());

        assert_eq!(path, PathBuf::from("/data/taxonomies/us-gaap/2024"));
    }

    #[test]
    fn test_work_item_routing() {
        // REQUIREMENT: The work item's kind decides its target layout and URL
        // PURPOSE: Verify the tagged-union accessors
        let resolver = PathResolver::new(Path::new("/data/entities"), Path::new("/data/taxonomies"));

        let filing_item = WorkItem::Filing(sample_filing());
        assert!(filing_item.url().ends_with("x.zip"));
        assert!(resolver
            .target_dir(&filing_item)
            .starts_with("/data/entities"));

        let taxonomy_item = WorkItem::Taxonomy(sample_library());
        assert!(taxonomy_item.url().contains("us-gaap"));
        assert!(resolver
            .target_dir(&taxonomy_item)
            .starts_with("/data/taxonomies"));
    }
}
