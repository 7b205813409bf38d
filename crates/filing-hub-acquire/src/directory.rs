use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use filing_hub_core::error::AppResult;
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};

use crate::http::HttpHandler;

/// Maximum directory nesting mirrored from a remote index
pub const DIRECTORY_MAX_DEPTH: u32 = 5;

/// Links never followed from a directory listing
const SKIP_LINKS: &[&str] = &["../", "..", "./", ".", "/"];

static ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a\s+[^>]*href\s*=\s*["']([^"']+)["']"#).expect("valid anchor regex"));

/// Result of mirroring a remote directory
#[derive(Debug, Clone)]
pub struct MirrorOutcome {
    pub success: bool,
    pub files_downloaded: usize,
    pub files: Vec<PathBuf>,
}

/// Mirrors a browsable HTML directory index recursively.
///
/// The walk is a bounded BFS with an explicit frontier and visited set;
/// each URL is processed at most once per session and only child links are
/// followed.
pub struct DirectoryHandler<'a> {
    http: &'a HttpHandler,
    max_depth: u32,
}

impl<'a> DirectoryHandler<'a> {
    pub fn new(http: &'a HttpHandler) -> Self {
        Self {
            http,
            max_depth: DIRECTORY_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(http: &'a HttpHandler, max_depth: u32) -> Self {
        Self { http, max_depth }
    }

    /// Mirror `directory_url` into `target_dir`
    pub async fn mirror_directory(
        &self,
        directory_url: &str,
        target_dir: &Path,
    ) -> AppResult<MirrorOutcome> {
        info!("{} Mirroring directory: {}", LOG_INPUT, directory_url);
        info!("{} Target directory: {}", LOG_OUTPUT, target_dir.display());

        tokio::fs::create_dir_all(target_dir).await?;

        let root_url = if directory_url.ends_with('/') {
            directory_url.to_string()
        } else {
            format!("{}/", directory_url)
        };

        let mut visited: HashSet<String> = HashSet::new();
        let mut files: Vec<PathBuf> = Vec::new();
        let mut frontier: VecDeque<(String, PathBuf, u32)> = VecDeque::new();
        frontier.push_back((root_url, target_dir.to_path_buf(), 0));

        while let Some((dir_url, local_dir, depth)) = frontier.pop_front() {
            if depth > self.max_depth {
                warn!("Max depth {} reached", self.max_depth);
                continue;
            }
            if !visited.insert(dir_url.clone()) {
                continue;
            }

            debug!("{} [{}] Mirroring: {}", LOG_PROCESS, depth, dir_url);

            let listing = match self.http.get_bytes(&dir_url).await {
                Ok((200, _, body)) => String::from_utf8_lossy(&body).into_owned(),
                Ok((status, _, _)) => {
                    warn!("HTTP {} for {}", status, dir_url);
                    continue;
                }
                Err(e) => {
                    error!("Error mirroring {}: {}", dir_url, e);
                    continue;
                }
            };

            let Ok(base) = url::Url::parse(&dir_url) else {
                continue;
            };

            for link in extract_links(&listing) {
                let Ok(full_url) = base.join(&link) else {
                    continue;
                };
                let full_url_str = full_url.to_string();

                // Only descend into children of the current listing
                if !full_url_str.starts_with(dir_url.as_str()) {
                    debug!("Skipping non-child link: {}", link);
                    continue;
                }

                if link.ends_with('/') {
                    let subdir = local_dir.join(link.trim_end_matches('/'));
                    tokio::fs::create_dir_all(&subdir).await?;
                    frontier.push_back((full_url_str, subdir, depth + 1));
                } else if !visited.contains(&full_url_str) {
                    visited.insert(full_url_str.clone());
                    if let Some(path) = self.download_file(&full_url_str, &local_dir).await {
                        files.push(path);
                    }
                }
            }
        }

        info!("{} Mirrored {} files", LOG_OUTPUT, files.len());

        Ok(MirrorOutcome {
            success: !files.is_empty(),
            files_downloaded: files.len(),
            files,
        })
    }

    async fn download_file(&self, file_url: &str, target_dir: &Path) -> Option<PathBuf> {
        let filename = file_url.rsplit('/').next().filter(|n| !n.is_empty())?;
        let local_path = target_dir.join(filename);

        match self.http.get_bytes(file_url).await {
            Ok((200, _, body)) => {
                if let Err(e) = std::fs::write(&local_path, body) {
                    error!("Error writing {}: {}", local_path.display(), e);
                    return None;
                }
                info!("{} Downloaded: {}", LOG_OUTPUT, filename);
                Some(local_path)
            }
            Ok((status, _, _)) => {
                warn!("HTTP {} for {}", status, file_url);
                None
            }
            Err(e) => {
                error!("Error downloading {}: {}", file_url, e);
                None
            }
        }
    }
}

/// Anchor hrefs from an HTML listing, with parent/self links dropped
pub fn extract_links(html: &str) -> Vec<String> {
    ANCHOR_RE
        .captures_iter(html)
        .map(|cap| cap[1].to_string())
        .filter(|href| !SKIP_LINKS.contains(&href.as_str()))
        .filter(|href| !href.starts_with('?') && !href.starts_with('#'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filing_hub_core::Config;

    #[test]
    fn test_extract_links() {
        // REQUIREMENT: Listing links are parsed from anchors; parent and
        //              query links are skipped
        // PURPOSE: Verify anchor extraction against an Apache-style index
        let html = r##"
            <html><body>
            <a href="../">Parent Directory</a>
            <a href="schema.xsd">schema.xsd</a>
            <a href='linkbases/'>linkbases/</a>
            <a href="?C=N;O=D">Name</a>
            <a href="#top">Top</a>
            </body></html>
        "##;

        assert_eq!(extract_links(html), vec!["schema.xsd", "linkbases/"]);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_mirror_directory() {
        // REQUIREMENT: Browsable directories are mirrored recursively
        // PURPOSE: Verify files and one subdirectory level land on disk
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        server
            .mock("GET", "/taxo/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(
                r#"<html><a href="../">up</a><a href="core.xsd">core.xsd</a><a href="labels/">labels/</a></html>"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/taxo/core.xsd")
            .with_status(200)
            .with_body("<schema/>")
            .create_async()
            .await;
        server
            .mock("GET", "/taxo/labels/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<html><a href="lab.xml">lab.xml</a></html>"#)
            .create_async()
            .await;
        server
            .mock("GET", "/taxo/labels/lab.xml")
            .with_status(200)
            .with_body("<linkbase/>")
            .create_async()
            .await;

        let config = Config::from_env().unwrap();
        let http = HttpHandler::new(&config).unwrap();
        let handler = DirectoryHandler::new(&http);

        let tmp = tempfile::tempdir().unwrap();
        let outcome = handler
            .mirror_directory(&format!("{}/taxo/", base), tmp.path())
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.files_downloaded, 2);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("core.xsd")).unwrap(),
            "<schema/>"
        );
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("labels/lab.xml")).unwrap(),
            "<linkbase/>"
        );
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_mirror_depth_limit() {
        // REQUIREMENT: Mirroring is bounded by DIRECTORY_MAX_DEPTH
        // PURPOSE: Verify listings past the cap are not fetched
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        server
            .mock("GET", "/d/")
            .with_status(200)
            .with_body(r#"<a href="one/">one/</a><a href="top.txt">top.txt</a>"#)
            .create_async()
            .await;
        server
            .mock("GET", "/d/top.txt")
            .with_status(200)
            .with_body("top")
            .create_async()
            .await;
        let deep = server
            .mock("GET", "/d/one/")
            .with_status(200)
            .with_body(r#"<a href="deep.txt">deep.txt</a>"#)
            .expect(0)
            .create_async()
            .await;

        let config = Config::from_env().unwrap();
        let http = HttpHandler::new(&config).unwrap();
        let handler = DirectoryHandler::with_max_depth(&http, 0);

        let tmp = tempfile::tempdir().unwrap();
        let outcome = handler
            .mirror_directory(&format!("{}/d/", base), tmp.path())
            .await
            .unwrap();

        assert_eq!(outcome.files_downloaded, 1);
        deep.assert_async().await;
    }
}
