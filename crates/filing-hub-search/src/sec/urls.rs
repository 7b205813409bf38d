//! SEC EDGAR URL construction and identifier formatting.

/// Submissions endpoint on the data host
pub const SUBMISSIONS_BASE_URL: &str = "https://data.sec.gov/submissions";

/// Filing archives on the www host
pub const ARCHIVES_BASE_URL: &str = "https://www.sec.gov/Archives/edgar/data";

/// Ticker/CIK index used for identifier resolution
pub const COMPANY_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";

const CIK_LENGTH: usize = 10;

/// Pad a CIK to 10 digits with leading zeros
pub fn pad_cik(cik: &str) -> String {
    format!("{:0>width$}", cik.trim().trim_start_matches('0'), width = CIK_LENGTH)
}

/// Strip leading zeros from a CIK for archive paths
pub fn unpad_cik(cik: &str) -> String {
    let stripped = cik.trim().trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// Build the submissions.json URL for a CIK
pub fn submissions_url(cik: &str) -> String {
    format!("{}/CIK{}.json", SUBMISSIONS_BASE_URL, pad_cik(cik))
}

/// Build the index.json URL for a filing directory
pub fn filing_index_url(cik: &str, accession: &str) -> String {
    format!(
        "{}/{}/{}/index.json",
        ARCHIVES_BASE_URL,
        unpad_cik(cik),
        accession.replace('-', "")
    )
}

/// Build a file download URL inside a filing directory
pub fn file_download_url(cik: &str, accession: &str, filename: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        ARCHIVES_BASE_URL,
        unpad_cik(cik),
        accession.replace('-', ""),
        filename
    )
}

/// Candidate XBRL archive URLs probed when no index document is available.
/// Ordered by how often each pattern occurs in practice.
pub fn xbrl_zip_candidates(cik: &str, accession: &str) -> Vec<String> {
    let cik_clean = unpad_cik(cik);
    let no_dashes = accession.replace('-', "");
    let underscored = accession.replace('-', "_");

    vec![
        format!("{}/{}/{}/{}-xbrl.zip", ARCHIVES_BASE_URL, cik_clean, no_dashes, accession),
        format!("{}/{}/{}/{}_htm.zip", ARCHIVES_BASE_URL, cik_clean, no_dashes, underscored),
        format!("{}/{}/{}/{}-xbrl.zip", ARCHIVES_BASE_URL, cik_clean, no_dashes, no_dashes),
        format!("{}/{}/{}/{}_xbrl.zip", ARCHIVES_BASE_URL, cik_clean, no_dashes, underscored),
    ]
}

/// Normalize a user-supplied form type to the official SEC spelling
pub fn normalize_form_type(form_type: &str) -> String {
    let cleaned: String = form_type
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .collect();

    match cleaned.as_str() {
        "10k" => "10-K".to_string(),
        "10q" => "10-Q".to_string(),
        "8k" => "8-K".to_string(),
        "20f" => "20-F".to_string(),
        "6k" => "6-K".to_string(),
        "10ka" => "10-K/A".to_string(),
        "10qa" => "10-Q/A".to_string(),
        _ => form_type.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cik_padding() {
        // REQUIREMENT: CIKs are zero-padded in the submissions API and bare in archives
        // PURPOSE: Verify both formattings round-trip
        assert_eq!(pad_cik("320193"), "0000320193");
        assert_eq!(pad_cik("0000320193"), "0000320193");
        assert_eq!(unpad_cik("0000320193"), "320193");
        assert_eq!(unpad_cik("0"), "0");
    }

    #[test]
    fn test_url_construction() {
        // REQUIREMENT: Archive URLs use the dash-free accession directory
        // PURPOSE: Verify the exact shapes probed against EDGAR
        assert_eq!(
            submissions_url("320193"),
            "https://data.sec.gov/submissions/CIK0000320193.json"
        );
        assert_eq!(
            filing_index_url("0000320193", "0000320193-24-000123"),
            "https://www.sec.gov/Archives/edgar/data/320193/000032019324000123/index.json"
        );
        assert_eq!(
            file_download_url("0000320193", "0000320193-24-000123", "report.zip"),
            "https://www.sec.gov/Archives/edgar/data/320193/000032019324000123/report.zip"
        );
    }

    #[test]
    fn test_xbrl_zip_candidates() {
        // REQUIREMENT: Without index.json the searcher probes fixed suffix patterns
        // PURPOSE: Verify the candidate list order and spellings
        let candidates = xbrl_zip_candidates("0000320193", "0000320193-24-000123");
        assert_eq!(candidates.len(), 4);
        assert!(candidates[0].ends_with("/0000320193-24-000123-xbrl.zip"));
        assert!(candidates[1].ends_with("/0000320193_24_000123_htm.zip"));
        assert!(candidates[2].ends_with("/000032019324000123-xbrl.zip"));
    }

    #[test]
    fn test_normalize_form_type() {
        // REQUIREMENT: User input like "10k" must match SEC's official form spelling
        // PURPOSE: Verify alias normalization and passthrough of unknown forms
        assert_eq!(normalize_form_type("10k"), "10-K");
        assert_eq!(normalize_form_type("10-K"), "10-K");
        assert_eq!(normalize_form_type("10_q"), "10-Q");
        assert_eq!(normalize_form_type(" 8 K "), "8-K");
        assert_eq!(normalize_form_type("DEF 14A"), "DEF 14A");
    }
}
