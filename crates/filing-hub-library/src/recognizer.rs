//! Pattern-based taxonomy namespace recognition.
//!
//! A leaf module: nothing here depends on the resolver, so the resolver can
//! use the recognizer as its fallback without a cycle.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Metadata recognized from a namespace URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedTaxonomy {
    pub taxonomy_name: String,
    pub version: String,
    pub namespace: String,
    pub download_url: String,
    pub authority: String,
    pub market_type: String,
    pub recognized: bool,
}

impl RecognizedTaxonomy {
    fn unknown(namespace: &str) -> Self {
        Self {
            taxonomy_name: "unknown".to_string(),
            version: "unknown".to_string(),
            namespace: namespace.to_string(),
            download_url: String::new(),
            authority: String::new(),
            market_type: "unknown".to_string(),
            recognized: false,
        }
    }
}

struct NamespacePattern {
    regex: &'static Lazy<Regex>,
    authority_group: usize,
    taxonomy_group: usize,
    version_group: usize,
}

// Authority-first layouts: http://{authority}/{taxonomy}/{version}
static AUTHORITY_TAXONOMY_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(?:www\.)?([^/]+)/([A-Za-z][\w.-]*)/(\d{4}(?:-\d{2}-\d{2})?)/?$")
        .expect("valid namespace pattern")
});

// Registrar-prefixed layouts: http://xbrl.{authority}/{taxonomy}/{version}.
// The full host is the authority; downloads live on the same host.
static XBRL_HOST_TAXONOMY_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(xbrl\.[^/]+)/([A-Za-z][\w.-]*)/(\d{4}(?:-\d{2}-\d{2})?)/?$")
        .expect("valid namespace pattern")
});

// Date-last layouts: http://{authority}/{path}/{taxonomy}/{yyyy-mm-dd}
static TAXONOMY_DATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(?:www\.)?([^/]+)/(?:[\w.-]+/)*([A-Za-z][\w.-]*)/(\d{4}-\d{2}-\d{2})/?$")
        .expect("valid namespace pattern")
});

const PATTERNS: &[NamespacePattern] = &[
    NamespacePattern {
        regex: &XBRL_HOST_TAXONOMY_VERSION,
        authority_group: 1,
        taxonomy_group: 2,
        version_group: 3,
    },
    NamespacePattern {
        regex: &AUTHORITY_TAXONOMY_VERSION,
        authority_group: 1,
        taxonomy_group: 2,
        version_group: 3,
    },
    NamespacePattern {
        regex: &TAXONOMY_DATED,
        authority_group: 1,
        taxonomy_group: 2,
        version_group: 3,
    },
];

/// Download URL templates, primary first
const URL_TEMPLATES: &[&str] = &[
    "https://{authority}/{taxonomy}/{version}/{taxonomy}-{version}.zip",
    "https://{authority}/{taxonomy}/{version}.zip",
    "https://{authority}/{taxonomy}/{version}/{taxonomy}.zip",
    "https://{authority}/{taxonomy}/{version}/{taxonomy}-{version}.xsd",
];

/// Recognizes taxonomy namespaces structurally and generates download URL
/// candidates from templates. Carries no per-taxonomy knowledge: everything
/// is derived from the namespace shape.
pub struct TaxonomyRecognizer;

impl TaxonomyRecognizer {
    pub fn new() -> Self {
        Self
    }

    /// Match a namespace URI against the pattern table
    pub fn match_namespace(&self, namespace_uri: &str) -> RecognizedTaxonomy {
        for pattern in PATTERNS {
            if let Some(captures) = pattern.regex.captures(namespace_uri) {
                let authority = captures
                    .get(pattern.authority_group)
                    .map(|m| m.as_str())
                    .unwrap_or("");
                let taxonomy_name = captures
                    .get(pattern.taxonomy_group)
                    .map(|m| m.as_str())
                    .unwrap_or("")
                    .trim_matches('/')
                    .to_lowercase();
                let version = captures
                    .get(pattern.version_group)
                    .map(|m| m.as_str())
                    .unwrap_or("")
                    .to_string();

                if taxonomy_name.is_empty() || version.is_empty() {
                    continue;
                }

                let download_url = render_template(URL_TEMPLATES[0], authority, &taxonomy_name, &version);
                let market_type = infer_market_type(authority);

                debug!(
                    "Matched: {} -> {} v{} ({})",
                    namespace_uri, taxonomy_name, version, market_type
                );

                return RecognizedTaxonomy {
                    taxonomy_name,
                    version,
                    namespace: namespace_uri.to_string(),
                    download_url,
                    authority: authority.to_string(),
                    market_type,
                    recognized: true,
                };
            }
        }

        debug!("No pattern matched for namespace: {}", namespace_uri);
        RecognizedTaxonomy::unknown(namespace_uri)
    }

    /// Alternative download URLs for a taxonomy, templates crossed with
    /// authority variants, duplicates and the namespace itself removed.
    pub fn alternative_urls(
        &self,
        taxonomy_name: &str,
        version: &str,
        namespace: &str,
    ) -> Vec<String> {
        let Some(authority) = extract_authority(namespace) else {
            return Vec::new();
        };

        let mut urls = Vec::new();
        for template in URL_TEMPLATES {
            for variant in authority_variants(&authority) {
                let url = render_template(template, &variant, taxonomy_name, version);
                if !url.is_empty() && url != namespace && !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }

        urls
    }
}

impl Default for TaxonomyRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

fn render_template(template: &str, authority: &str, taxonomy: &str, version: &str) -> String {
    template
        .replace("{authority}", authority)
        .replace("{taxonomy}", taxonomy)
        .replace("{version}", version)
}

/// Host variants tried for alternative URLs
fn authority_variants(authority: &str) -> Vec<String> {
    let bare = authority
        .trim_start_matches("www.")
        .trim_start_matches("xbrl.")
        .to_string();

    let mut variants = vec![authority.to_string()];
    for candidate in [
        bare.clone(),
        format!("xbrl.{}", bare),
        format!("www.{}", bare),
    ] {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }

    variants
}

fn extract_authority(namespace: &str) -> Option<String> {
    static AUTHORITY_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^https?://([^/]+)").expect("valid authority regex"));

    AUTHORITY_RE
        .captures(namespace)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Market inferred from the authority domain
pub fn infer_market_type(authority: &str) -> String {
    let authority = authority.to_lowercase();

    if authority.ends_with("fasb.org")
        || authority.ends_with("sec.gov")
        || authority.ends_with("xbrl.us")
    {
        "sec".to_string()
    } else if authority.ends_with("frc.org.uk") || authority.ends_with("companieshouse.gov.uk") {
        "uk_frc".to_string()
    } else if authority.ends_with("ifrs.org")
        || authority.ends_with("esma.europa.eu")
        || authority.ends_with("xbrl.org")
    {
        "esef".to_string()
    } else {
        "unknown".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_year_versioned_namespaces() {
        // REQUIREMENT: Any authority/taxonomy/version namespace is recognized
        //              structurally
        // PURPOSE: Verify the main namespace shapes across authorities
        let recognizer = TaxonomyRecognizer::new();

        let result = recognizer.match_namespace("http://fasb.org/us-gaap/2024");
        assert!(result.recognized);
        assert_eq!(result.taxonomy_name, "us-gaap");
        assert_eq!(result.version, "2024");
        assert_eq!(result.authority, "fasb.org");
        assert_eq!(result.market_type, "sec");
        assert_eq!(
            result.download_url,
            "https://fasb.org/us-gaap/2024/us-gaap-2024.zip"
        );

        let result = recognizer.match_namespace("http://xbrl.sec.gov/dei/2024");
        assert!(result.recognized);
        assert_eq!(result.taxonomy_name, "dei");
        assert_eq!(result.market_type, "sec");
    }

    #[test]
    fn test_match_dated_namespace() {
        // REQUIREMENT: Date-versioned namespaces (IFRS style) are recognized
        // PURPOSE: Verify the yyyy-mm-dd pattern
        let recognizer = TaxonomyRecognizer::new();

        let result =
            recognizer.match_namespace("https://xbrl.ifrs.org/taxonomy/full_ifrs/2024-03-27");
        assert!(result.recognized);
        assert_eq!(result.taxonomy_name, "full_ifrs");
        assert_eq!(result.version, "2024-03-27");
        assert_eq!(result.market_type, "esef");
    }

    #[test]
    fn test_unrecognized_namespace() {
        // REQUIREMENT: Unmatched namespaces return the unknown record
        // PURPOSE: Verify no-match does not invent data
        let recognizer = TaxonomyRecognizer::new();

        let result = recognizer.match_namespace("http://example.com/no-version-here");
        assert!(!result.recognized);
        assert_eq!(result.taxonomy_name, "unknown");
        assert_eq!(result.version, "unknown");
        assert!(result.download_url.is_empty());
    }

    #[test]
    fn test_alternative_urls() {
        // REQUIREMENT: Alternatives come from templates crossed with authority
        //              variants, deduplicated
        // PURPOSE: Verify ordering, variants, and dedup
        let recognizer = TaxonomyRecognizer::new();

        let urls =
            recognizer.alternative_urls("us-gaap", "2024", "http://fasb.org/us-gaap/2024");

        assert!(!urls.is_empty());
        // Primary template with the declared authority comes first
        assert_eq!(urls[0], "https://fasb.org/us-gaap/2024/us-gaap-2024.zip");
        // Variant hosts appear
        assert!(urls.iter().any(|u| u.contains("xbrl.fasb.org")));
        // No duplicates
        let mut deduped = urls.clone();
        deduped.dedup();
        assert_eq!(urls.len(), deduped.len());
    }

    #[test]
    fn test_infer_market_type() {
        // REQUIREMENT: The authority implies the market
        // PURPOSE: Verify the authority -> market table
        assert_eq!(infer_market_type("fasb.org"), "sec");
        assert_eq!(infer_market_type("xbrl.sec.gov"), "sec");
        assert_eq!(infer_market_type("frc.org.uk"), "uk_frc");
        assert_eq!(infer_market_type("xbrl.ifrs.org"), "esef");
        assert_eq!(infer_market_type("example.org"), "unknown");
    }
}
