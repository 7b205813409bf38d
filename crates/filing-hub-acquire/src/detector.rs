use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};

use crate::headers::{is_companies_house_url, ACCEPT_IXBRL};
use crate::http::HttpHandler;

/// How a remote artifact is packaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionType {
    /// ZIP or TAR archive to download and extract
    Archive,
    /// Individual schema file plus its dependency closure
    Xsd,
    /// Browsable HTML directory index to mirror
    Directory,
    /// Single iXBRL document, no extraction
    Ixbrl,
    Unknown,
}

impl std::fmt::Display for DistributionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributionType::Archive => write!(f, "archive"),
            DistributionType::Xsd => write!(f, "xsd"),
            DistributionType::Directory => write!(f, "directory"),
            DistributionType::Ixbrl => write!(f, "ixbrl"),
            DistributionType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Outcome of distribution detection for one URL
#[derive(Debug, Clone)]
pub struct Detection {
    pub dist_type: DistributionType,
    /// May differ from the requested URL when an alternative resolved
    pub url: String,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub exists: bool,
    pub status: Option<u16>,
    /// Alternatives probed when the primary URL did not resolve
    pub alternatives_tried: Vec<String>,
    pub error: Option<String>,
}

const ARCHIVE_CONTENT_TYPES: &[&str] = &[
    "application/zip",
    "application/x-zip-compressed",
    "application/x-tar",
    "application/gzip",
    "application/x-gzip",
    "application/x-bzip2",
    "application/x-xz",
    "application/octet-stream",
];

const IXBRL_CONTENT_TYPES: &[&str] = &["application/xhtml+xml"];

const XSD_CONTENT_TYPES: &[&str] = &["application/xml", "text/xml"];

const DIRECTORY_CONTENT_TYPES: &[&str] = &["text/html"];

const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".zip", ".tar", ".tar.gz", ".tgz", ".tar.bz2", ".tbz2", ".tar.xz", ".txz",
];

const SCHEMA_EXTENSIONS: &[&str] = &[".xsd"];

const IXBRL_EXTENSIONS: &[&str] = &[".xhtml", ".html", ".htm"];

/// Entry-point schema names tried when an archive URL does not resolve
const XSD_ENTRY_PATTERNS: &[&str] = &["{base}.xsd", "{base}/{name}.xsd", "{base}/entryPoint.xsd"];

/// Classifies a remote URL by HEAD probe, URL shape, and alternative probes.
pub struct DistributionDetector<'a> {
    http: &'a HttpHandler,
}

impl<'a> DistributionDetector<'a> {
    pub fn new(http: &'a HttpHandler) -> Self {
        Self { http }
    }

    /// Detect the distribution type for a URL.
    ///
    /// Companies House documents short-circuit: their Document API rejects
    /// HEAD, so they are declared single-file iXBRL up front and the download
    /// negotiates the actual format.
    pub async fn detect(&self, url: &str) -> Detection {
        info!("{} Detecting distribution type: {}", LOG_INPUT, url);

        if is_companies_house_url(url) {
            info!("{} Companies House document detected (requesting iXBRL)", LOG_OUTPUT);
            return Detection {
                dist_type: DistributionType::Ixbrl,
                url: url.to_string(),
                content_type: ACCEPT_IXBRL.to_string(),
                content_length: None,
                exists: true,
                status: Some(200),
                alternatives_tried: Vec::new(),
                error: None,
            };
        }

        let primary = self.check_url(url).await;
        if primary.exists {
            info!("{} Detected: {} at {}", LOG_OUTPUT, primary.dist_type, url);
            return primary;
        }

        debug!("{} Primary URL not found, trying alternatives", LOG_PROCESS);
        let alternatives = generate_alternatives(url);

        for alt_url in &alternatives {
            debug!("{} Trying alternative: {}", LOG_PROCESS, alt_url);
            let alt_result = self.check_url(alt_url).await;

            if alt_result.exists {
                info!("{} Found at alternative URL: {}", LOG_OUTPUT, alt_url);
                return Detection {
                    alternatives_tried: alternatives.clone(),
                    ..alt_result
                };
            }
        }

        warn!("{} Could not detect distribution type for {}", LOG_OUTPUT, url);
        Detection {
            alternatives_tried: alternatives,
            ..primary
        }
    }

    async fn check_url(&self, url: &str) -> Detection {
        match self.http.head_request(url).await {
            Some(head) if head.status == 200 => Detection {
                dist_type: classify(&head.content_type, url),
                url: url.to_string(),
                content_type: head.content_type,
                content_length: head.content_length,
                exists: true,
                status: Some(head.status),
                alternatives_tried: Vec::new(),
                error: None,
            },
            Some(head) => Detection {
                dist_type: DistributionType::Unknown,
                url: url.to_string(),
                content_type: head.content_type,
                content_length: None,
                exists: false,
                status: Some(head.status),
                alternatives_tried: Vec::new(),
                error: None,
            },
            None => Detection {
                dist_type: DistributionType::Unknown,
                url: url.to_string(),
                content_type: String::new(),
                content_length: None,
                exists: false,
                status: None,
                alternatives_tried: Vec::new(),
                error: Some("request failed".to_string()),
            },
        }
    }
}

/// Classify by Content-Type first, then by URL suffix.
///
/// Ambiguity resolves toward iXBRL when the URL ends in an XHTML/HTML
/// extension and carries no archive signal.
pub fn classify(content_type: &str, url: &str) -> DistributionType {
    let url_lower = url.to_lowercase();
    let path = url_path(&url_lower);

    if ARCHIVE_CONTENT_TYPES.iter().any(|ct| content_type.contains(ct)) {
        // octet-stream on an .xsd URL is a schema, not an archive
        if content_type.contains("octet-stream")
            && SCHEMA_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        {
            return DistributionType::Xsd;
        }
        return DistributionType::Archive;
    }

    if IXBRL_CONTENT_TYPES.iter().any(|ct| content_type.contains(ct)) {
        return DistributionType::Ixbrl;
    }

    if IXBRL_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return DistributionType::Ixbrl;
    }

    if XSD_CONTENT_TYPES.iter().any(|ct| content_type.contains(ct)) {
        return DistributionType::Xsd;
    }

    if DIRECTORY_CONTENT_TYPES.iter().any(|ct| content_type.contains(ct)) {
        return DistributionType::Directory;
    }

    // No usable Content-Type; fall back to the URL shape
    if ARCHIVE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return DistributionType::Archive;
    }

    if SCHEMA_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return DistributionType::Xsd;
    }

    if path.ends_with('/') {
        return DistributionType::Directory;
    }

    DistributionType::Unknown
}

/// Alternative URLs to try when the primary does not resolve:
/// archives yield schema entry points plus the parent directory, schemas
/// yield the archive, directories yield index documents.
pub fn generate_alternatives(url: &str) -> Vec<String> {
    let url_lower = url.to_lowercase();
    let mut alternatives = Vec::new();

    if let Some(ext) = ARCHIVE_EXTENSIONS
        .iter()
        .find(|ext| url_lower.ends_with(**ext))
    {
        let base = &url[..url.len() - ext.len()];
        let name = base.rsplit('/').next().unwrap_or("taxonomy");

        for pattern in XSD_ENTRY_PATTERNS {
            alternatives.push(
                pattern
                    .replace("{base}", base)
                    .replace("{name}", name),
            );
        }

        // Parent directory listing
        if let Some(slash) = url.rfind('/') {
            alternatives.push(format!("{}/", &url[..slash]));
        }
    } else if let Some(ext) = SCHEMA_EXTENSIONS
        .iter()
        .find(|ext| url_lower.ends_with(**ext))
    {
        let base = &url[..url.len() - ext.len()];
        alternatives.push(format!("{}.zip", base));
    } else if url.ends_with('/') {
        alternatives.push(format!("{}index.html", url));
        alternatives.push(format!("{}index.htm", url));
    }

    alternatives
}

fn url_path(url: &str) -> &str {
    // Strip query and fragment so suffix checks see the path
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use filing_hub_core::Config;

    #[test]
    fn test_classify_by_content_type() {
        // REQUIREMENT: Content-Type is the first classification signal
        // PURPOSE: Verify the enumerated content-type sets
        assert_eq!(
            classify("application/zip", "https://x.org/t"),
            DistributionType::Archive
        );
        assert_eq!(
            classify("application/xhtml+xml", "https://x.org/doc"),
            DistributionType::Ixbrl
        );
        assert_eq!(
            classify("application/xml", "https://x.org/schema.xsd"),
            DistributionType::Xsd
        );
        assert_eq!(
            classify("text/html", "https://x.org/listing/"),
            DistributionType::Directory
        );
    }

    #[test]
    fn test_classify_by_url_suffix() {
        // REQUIREMENT: URL shape is the fallback classification signal
        // PURPOSE: Verify suffix classification when Content-Type is useless
        assert_eq!(classify("", "https://x.org/t.zip"), DistributionType::Archive);
        assert_eq!(classify("", "https://x.org/t.tar.gz"), DistributionType::Archive);
        assert_eq!(classify("", "https://x.org/t.xsd"), DistributionType::Xsd);
        assert_eq!(classify("", "https://x.org/dir/"), DistributionType::Directory);
        assert_eq!(classify("", "https://x.org/mystery"), DistributionType::Unknown);
    }

    #[test]
    fn test_ambiguity_resolves_to_ixbrl() {
        // REQUIREMENT: .xhtml/.html with no archive signal reads as iXBRL
        // PURPOSE: Verify text/html on an .xhtml URL is not a directory
        assert_eq!(
            classify("text/html", "https://x.org/accounts.xhtml"),
            DistributionType::Ixbrl
        );
        assert_eq!(
            classify("", "https://x.org/accounts.html"),
            DistributionType::Ixbrl
        );
        // octet-stream on an .xsd path is a schema
        assert_eq!(
            classify("application/octet-stream", "https://x.org/core.xsd"),
            DistributionType::Xsd
        );
    }

    #[test]
    fn test_generate_alternatives_for_archive() {
        // REQUIREMENT: An unresolvable archive URL yields XSD entry variants
        //              and the parent directory
        // PURPOSE: Verify the alternative generation rules
        let alternatives = generate_alternatives("https://x.org/taxo/us-gaap-2024.zip");

        assert_eq!(
            alternatives,
            vec![
                "https://x.org/taxo/us-gaap-2024.xsd".to_string(),
                "https://x.org/taxo/us-gaap-2024/us-gaap-2024.xsd".to_string(),
                "https://x.org/taxo/us-gaap-2024/entryPoint.xsd".to_string(),
                "https://x.org/taxo/".to_string(),
            ]
        );
    }

    #[test]
    fn test_generate_alternatives_for_xsd_and_directory() {
        // REQUIREMENT: XSD URLs try the archive; trailing-slash URLs try indexes
        // PURPOSE: Verify the remaining alternative rules
        assert_eq!(
            generate_alternatives("https://x.org/taxo/core.xsd"),
            vec!["https://x.org/taxo/core.zip".to_string()]
        );
        assert_eq!(
            generate_alternatives("https://x.org/taxo/"),
            vec![
                "https://x.org/taxo/index.html".to_string(),
                "https://x.org/taxo/index.htm".to_string(),
            ]
        );
        assert!(generate_alternatives("https://x.org/mystery").is_empty());
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_companies_house_short_circuit() {
        // REQUIREMENT: CH documents skip HEAD and are declared iXBRL
        // PURPOSE: Verify no HTTP traffic happens for CH URLs
        let config = Config::from_env().unwrap();
        let http = HttpHandler::new(&config).unwrap();
        let detector = DistributionDetector::new(&http);

        let detection = detector
            .detect("https://document-api.company-information.service.gov.uk/document/abc/content")
            .await;

        assert_eq!(detection.dist_type, DistributionType::Ixbrl);
        assert!(detection.exists);
        assert_eq!(detection.content_type, "application/xhtml+xml");
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_detect_with_head_probe() {
        // REQUIREMENT: Detection issues a HEAD and classifies the response
        // PURPOSE: Verify the happy path against a mock server
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/us-gaap-2024.zip")
            .with_status(200)
            .with_header("content-type", "application/zip")
            .create_async()
            .await;

        let config = Config::from_env().unwrap();
        let http = HttpHandler::new(&config).unwrap();
        let detector = DistributionDetector::new(&http);

        let detection = detector
            .detect(&format!("{}/us-gaap-2024.zip", server.url()))
            .await;

        assert!(detection.exists);
        assert_eq!(detection.dist_type, DistributionType::Archive);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_detect_falls_back_to_alternatives() {
        // REQUIREMENT: On failure the detector probes generated alternatives
        // PURPOSE: Verify the first resolving alternative is returned
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/taxo/dei-2024.zip")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("HEAD", "/taxo/dei-2024.xsd")
            .with_status(200)
            .with_header("content-type", "application/xml")
            .create_async()
            .await;

        let config = Config::from_env().unwrap();
        let http = HttpHandler::new(&config).unwrap();
        let detector = DistributionDetector::new(&http);

        let detection = detector
            .detect(&format!("{}/taxo/dei-2024.zip", server.url()))
            .await;

        assert!(detection.exists);
        assert_eq!(detection.dist_type, DistributionType::Xsd);
        assert!(detection.url.ends_with("/taxo/dei-2024.xsd"));
        assert!(!detection.alternatives_tried.is_empty());
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_detect_all_alternatives_fail() {
        // REQUIREMENT: When nothing resolves, exists=false with the probe list
        // PURPOSE: Verify the terminal not-found shape
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", mockito::Matcher::Any)
            .with_status(404)
            .expect_at_least(2)
            .create_async()
            .await;

        let config = Config::from_env().unwrap();
        let http = HttpHandler::new(&config).unwrap();
        let detector = DistributionDetector::new(&http);

        let detection = detector
            .detect(&format!("{}/taxo/ghost.zip", server.url()))
            .await;

        assert!(!detection.exists);
        assert_eq!(detection.status, Some(404));
        assert_eq!(detection.alternatives_tried.len(), 4);
    }
}
