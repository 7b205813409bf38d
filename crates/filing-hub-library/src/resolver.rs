//! Namespace -> taxonomy library resolution.
//!
//! Trusts the filing's declared namespace first: the download URL is
//! constructed directly from the URI structure. Pattern-based recognition is
//! the fallback, never the primary path.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};

use crate::recognizer::TaxonomyRecognizer;

/// How a namespace was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// URL constructed directly from the declared namespace
    Direct,
    /// Pattern-based recognizer fallback
    Fallback,
    /// Bundled inside a parent taxonomy; recognized but not downloaded
    Included,
    /// Company-specific extension; dropped from requirements
    CompanyExtension,
    Unknown,
}

/// One resolved namespace
#[derive(Debug, Clone)]
pub struct ResolvedNamespace {
    pub taxonomy_name: String,
    pub version: String,
    pub namespace: String,
    pub download_url: String,
    pub authority: String,
    pub source: ResolutionSource,
    pub recognized: bool,
}

impl ResolvedNamespace {
    /// Whether this namespace demands a downloadable library
    pub fn is_required_library(&self) -> bool {
        self.recognized
            && !matches!(
                self.source,
                ResolutionSource::CompanyExtension | ResolutionSource::Included
            )
    }
}

/// Versions must look like a year or a dated release
static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}(?:-\d{2}-\d{2})?$").expect("valid version regex"));

/// Vendor suffixes that mark company extension namespaces
static COMPANY_EXTENSION_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Ticker-style host on a vendor domain: http://{ticker}.com/20240928
        Regex::new(r"^https?://(?:www\.)?[a-z0-9-]+\.(?:com|net|io|co)/\d{8}$").unwrap(),
        // Explicit extension path segments
        Regex::new(r"/extension[s]?/").unwrap(),
        Regex::new(r"^https?://(?:www\.)?[a-z0-9-]+\.(?:com|net|io|co)/(?:xbrl|taxonomy)/\d{4}")
            .unwrap(),
    ]
});

/// Taxonomies whose effective distribution rides inside us-gaap/dei
const INCLUDED_TAXONOMIES: &[&str] = &["country", "currency", "exch", "stpr", "naics", "sic"];

/// Reserved names that are never valid taxonomy names
const RESERVED_TAXONOMY_NAMES: &[&str] = &["www", "xbrl", "taxonomy", "ns", "schema"];

/// Authority rewrites: namespaces declare the canonical host, downloads live
/// on the registrar's mirror.
const AUTHORITY_TRANSFORMS: &[(&str, &str)] = &[
    ("fasb.org", "xbrl.fasb.org"),
    ("sec.gov", "xbrl.sec.gov"),
    ("ifrs.org", "xbrl.ifrs.org"),
];

/// Primary download URL template for directly-constructed URLs
const URL_PATTERN_PRIMARY: &str = "https://{authority}/{taxonomy}/{version}/{taxonomy}-{version}.zip";

/// Resolves namespace URIs to `(taxonomy_name, version, download_url)`.
pub struct NamespaceResolver {
    recognizer: TaxonomyRecognizer,
}

impl NamespaceResolver {
    pub fn new() -> Self {
        Self {
            recognizer: TaxonomyRecognizer::new(),
        }
    }

    /// Resolve one namespace. Direct construction first; the recognizer only
    /// runs when direct construction fails and `use_fallback` is set.
    pub fn resolve_namespace(&self, namespace: &str, use_fallback: bool) -> ResolvedNamespace {
        debug!("{} Resolving namespace: {}", LOG_INPUT, namespace);

        if is_company_extension(namespace) {
            info!("{} Skipping company extension: {}", LOG_OUTPUT, namespace);
            return ResolvedNamespace {
                taxonomy_name: "company-extension".to_string(),
                version: "unknown".to_string(),
                namespace: namespace.to_string(),
                download_url: String::new(),
                authority: String::new(),
                source: ResolutionSource::CompanyExtension,
                recognized: false,
            };
        }

        if let Some(direct) = construct_url_directly(namespace) {
            if INCLUDED_TAXONOMIES.contains(&direct.taxonomy_name.as_str()) {
                info!(
                    "{} Taxonomy '{}' is bundled in parent taxonomies - marking as included",
                    LOG_OUTPUT, direct.taxonomy_name
                );
                return ResolvedNamespace {
                    source: ResolutionSource::Included,
                    download_url: String::new(),
                    recognized: true,
                    ..direct
                };
            }

            info!(
                "{} Resolved directly: {} -> {} v{}",
                LOG_OUTPUT, namespace, direct.taxonomy_name, direct.version
            );
            return direct;
        }

        if use_fallback {
            info!("{} Direct construction failed, using fallback", LOG_PROCESS);
            let matched = self.recognizer.match_namespace(namespace);

            if matched.recognized {
                info!(
                    "{} Resolved via fallback: {} -> {} v{}",
                    LOG_OUTPUT, namespace, matched.taxonomy_name, matched.version
                );
                return ResolvedNamespace {
                    taxonomy_name: matched.taxonomy_name,
                    version: matched.version,
                    namespace: matched.namespace,
                    download_url: matched.download_url,
                    authority: matched.authority,
                    source: ResolutionSource::Fallback,
                    recognized: true,
                };
            }
        }

        warn!("{} Could not resolve namespace: {}", LOG_OUTPUT, namespace);
        ResolvedNamespace {
            taxonomy_name: "unknown".to_string(),
            version: "unknown".to_string(),
            namespace: namespace.to_string(),
            download_url: String::new(),
            authority: String::new(),
            source: ResolutionSource::Unknown,
            recognized: false,
        }
    }

    /// Resolve a namespace set to the deduplicated list of required
    /// libraries. Company extensions, bundled taxonomies, and unresolved
    /// namespaces are dropped.
    pub fn get_required_libraries(
        &self,
        namespaces: &HashSet<String>,
        use_fallback: bool,
    ) -> Vec<ResolvedNamespace> {
        info!(
            "{} Getting required libraries from {} namespaces",
            LOG_INPUT,
            namespaces.len()
        );

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut required = Vec::new();

        for namespace in namespaces {
            let resolved = self.resolve_namespace(namespace, use_fallback);

            if !resolved.is_required_library() {
                continue;
            }

            let key = (resolved.taxonomy_name.clone(), resolved.version.clone());
            if seen.insert(key) {
                required.push(resolved);
            }
        }

        info!("{} Required libraries: {}", LOG_OUTPUT, required.len());
        required
    }

    /// Alternative URLs for a library, delegated to the recognizer
    pub fn alternative_urls(&self, taxonomy_name: &str, version: &str, namespace: &str) -> Vec<String> {
        self.recognizer
            .alternative_urls(taxonomy_name, version, namespace)
    }
}

impl Default for NamespaceResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the version string looks like a taxonomy release
pub fn is_valid_version(version: &str) -> bool {
    VERSION_RE.is_match(version)
}

/// Whether a namespace matches the company-extension pattern set
pub fn is_company_extension(namespace: &str) -> bool {
    COMPANY_EXTENSION_RES
        .iter()
        .any(|re| re.is_match(namespace))
}

/// Apply the authority normalization table
pub fn transform_authority(authority: &str) -> String {
    let bare = authority.trim_start_matches("www.");

    for (canonical, mirror) in AUTHORITY_TRANSFORMS {
        if bare == *canonical {
            return mirror.to_string();
        }
    }

    authority.to_string()
}

/// Construct a download URL directly from the namespace structure:
/// parse `(authority, taxonomy_name, version)` from the URI path, validate
/// the version, and format against the primary template.
fn construct_url_directly(namespace: &str) -> Option<ResolvedNamespace> {
    let parsed = url::Url::parse(namespace).ok()?;
    let authority = parsed.host_str()?.to_string();

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let taxonomy_name = segments.first()?.to_lowercase();
    let version = segments.get(1).copied().unwrap_or("unknown");

    if !is_valid_version(version) {
        return None;
    }

    if RESERVED_TAXONOMY_NAMES.contains(&taxonomy_name.as_str()) {
        return None;
    }

    let download_authority = transform_authority(&authority);
    let download_url = URL_PATTERN_PRIMARY
        .replace("{authority}", &download_authority)
        .replace("{taxonomy}", &taxonomy_name)
        .replace("{version}", version);

    Some(ResolvedNamespace {
        taxonomy_name,
        version: version.to_string(),
        namespace: namespace.to_string(),
        download_url,
        authority,
        source: ResolutionSource::Direct,
        recognized: true,
    })
}
