use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use filing_hub_core::error::AppResult;
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};

use crate::headers::is_companies_house_url;
use crate::http::HttpHandler;

/// Maximum depth of the import/include closure
pub const XSD_MAX_IMPORT_DEPTH: u32 = 5;

const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

const DEFAULT_SCHEMA_FILENAME: &str = "schema.xsd";

/// Accept values tried against the Companies House Document API, iXBRL first
const CH_ACCEPT_LADDER: &[&str] = &["application/xhtml+xml", "text/html", "application/pdf"];

/// Result of downloading a schema and its dependency closure
#[derive(Debug, Clone)]
pub struct XsdDownloadOutcome {
    pub success: bool,
    pub files_downloaded: usize,
    pub files: Vec<PathBuf>,
}

/// Downloads an XSD schema and transitively follows its `xs:import`,
/// `xs:include`, and `link:linkbaseRef` dependencies.
///
/// The closure is walked with an explicit frontier and a visited set, bounded
/// by `XSD_MAX_IMPORT_DEPTH`; each URL is fetched at most once.
pub struct XsdHandler<'a> {
    http: &'a HttpHandler,
    max_depth: u32,
}

impl<'a> XsdHandler<'a> {
    pub fn new(http: &'a HttpHandler) -> Self {
        Self {
            http,
            max_depth: XSD_MAX_IMPORT_DEPTH,
        }
    }

    pub fn with_max_depth(http: &'a HttpHandler, max_depth: u32) -> Self {
        Self { http, max_depth }
    }

    /// Download the primary schema and all reachable dependencies into
    /// `target_dir`.
    pub async fn download_schema(
        &self,
        schema_url: &str,
        target_dir: &Path,
    ) -> AppResult<XsdDownloadOutcome> {
        info!("{} Downloading XSD schema: {}", LOG_INPUT, schema_url);
        info!("{} Target directory: {}", LOG_OUTPUT, target_dir.display());

        tokio::fs::create_dir_all(target_dir).await?;

        let mut visited: HashSet<String> = HashSet::new();
        let mut files: Vec<PathBuf> = Vec::new();
        let mut frontier: Vec<(String, u32)> = vec![(schema_url.to_string(), 0)];

        while let Some((url, depth)) = frontier.pop() {
            if depth > self.max_depth {
                warn!("Max depth {} reached, stopping recursion", self.max_depth);
                continue;
            }
            if !visited.insert(url.clone()) {
                debug!("Already downloaded: {}", url);
                continue;
            }

            debug!("{} [{}] Downloading: {}", LOG_PROCESS, depth, url);

            let fetched = if is_companies_house_url(&url) {
                self.fetch_companies_house(&url).await
            } else {
                self.fetch_standard(&url).await
            };

            let Some((content, content_type)) = fetched else {
                continue;
            };

            let filename = derive_filename(&url, &content_type);
            let local_path = target_dir.join(&filename);
            tokio::fs::write(&local_path, &content).await?;
            files.push(local_path);

            info!("{} [{}] Saved: {}", LOG_OUTPUT, depth, filename);

            // Only XML documents can declare further dependencies
            if looks_like_xml(&content) {
                let dependencies = extract_dependencies(&content, &url);
                if !dependencies.is_empty() {
                    debug!("{} Found {} dependencies", LOG_PROCESS, dependencies.len());
                }
                for dep_url in dependencies {
                    if !visited.contains(&dep_url) {
                        frontier.push((dep_url, depth + 1));
                    }
                }
            }
        }

        info!("{} Downloaded {} schema files", LOG_OUTPUT, files.len());

        Ok(XsdDownloadOutcome {
            success: !files.is_empty(),
            files_downloaded: files.len(),
            files,
        })
    }

    async fn fetch_standard(&self, url: &str) -> Option<(Vec<u8>, String)> {
        match self.http.get_bytes(url).await {
            Ok((200, content_type, body)) => Some((body, content_type)),
            Ok((status, _, _)) => {
                warn!("HTTP {} for {}", status, url);
                None
            }
            Err(e) => {
                error!("Error downloading {}: {}", url, e);
                None
            }
        }
    }

    async fn fetch_companies_house(&self, url: &str) -> Option<(Vec<u8>, String)> {
        fetch_with_format_ladder(self.http, url).await
    }
}

/// Companies House content negotiation: walk the accept-format ladder
/// (xhtml+xml -> html -> pdf), treating 406 as "format not offered, try the
/// next one". Returns the body and the content type that actually resolved.
pub async fn fetch_with_format_ladder(
    http: &HttpHandler,
    url: &str,
) -> Option<(Vec<u8>, String)> {
    for accept in CH_ACCEPT_LADDER {
        info!("{} Trying format: {}", LOG_PROCESS, accept);

        match http.get_bytes_with_accept(url, accept).await {
            Ok((200, content_type, body)) => {
                let actual = if content_type.is_empty() {
                    accept.to_string()
                } else {
                    content_type
                };
                info!("{} Successfully downloaded as {}", LOG_OUTPUT, actual);
                return Some((body, actual));
            }
            Ok((406, _, _)) => {
                info!("{} Format {} not available (406)", LOG_PROCESS, accept);
                continue;
            }
            Ok((status, _, _)) => {
                warn!("HTTP {} for {} with Accept: {}", status, url, accept);
                continue;
            }
            Err(e) => {
                warn!("Error trying format {}: {}", accept, e);
                continue;
            }
        }
    }

    error!("All format attempts failed for {}", url);
    None
}

/// Extract dependency URLs from schema content, resolved against `base_url`.
///
/// The attribute set is deliberately small: `schemaLocation` on imports and
/// includes, `xlink:href` on linkbase references.
pub fn extract_dependencies(xml_content: &[u8], base_url: &str) -> Vec<String> {
    let Ok(text) = std::str::from_utf8(xml_content) else {
        return Vec::new();
    };

    let doc = match roxmltree::Document::parse(text) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("XML parse error (might not be XML): {}", e);
            return Vec::new();
        }
    };

    let Ok(base) = url::Url::parse(base_url) else {
        return Vec::new();
    };

    let mut dependencies = Vec::new();

    for node in doc.descendants().filter(|n| n.is_element()) {
        let location = match node.tag_name().name() {
            "import" | "include" if node.tag_name().namespace() == Some(XS_NAMESPACE) => {
                node.attribute("schemaLocation")
            }
            "linkbaseRef" => node.attribute((XLINK_NAMESPACE, "href")),
            _ => None,
        };

        if let Some(location) = location {
            if let Ok(absolute) = base.join(location) {
                dependencies.push(absolute.to_string());
            }
        }
    }

    dependencies
}

/// Derive the local filename: last URL path component, or a content-type
/// based name when the path is empty or generic (`content`).
pub fn derive_filename(url: &str, content_type: &str) -> String {
    let path_name = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(String::from))
        })
        .unwrap_or_default();

    if !path_name.is_empty() && path_name != "content" {
        return path_name;
    }

    if content_type.contains("xhtml") || content_type.contains("xml") {
        "accounts.xhtml".to_string()
    } else if content_type.contains("html") {
        "accounts.html".to_string()
    } else if content_type.contains("pdf") {
        "accounts.pdf".to_string()
    } else {
        DEFAULT_SCHEMA_FILENAME.to_string()
    }
}

fn looks_like_xml(content: &[u8]) -> bool {
    let head = &content[..content.len().min(512)];
    let Ok(text) = std::str::from_utf8(head) else {
        return false;
    };
    let trimmed = text.trim_start();
    trimmed.starts_with("<?xml") || trimmed.starts_with('<')
}
