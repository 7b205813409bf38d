use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use filing_hub_core::error::AppResult;
use filing_hub_core::logging::LOG_OUTPUT;

/// Build a unique temp path for a download.
///
/// The uuid prefix keeps concurrent downloads of same-named artifacts from
/// colliding; the original filename is preserved for format dispatch.
pub fn unique_temp_path(temp_dir: &Path, url: &str) -> PathBuf {
    let filename = url
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("download");

    // Strip any query string from the name
    let filename = filename.split(['?', '#']).next().unwrap_or("download");

    temp_dir.join(format!("{}_{}", Uuid::new_v4(), filename))
}

/// Remove temp files older than `max_age`.
///
/// Failed downloads leave their temp files behind for post-mortem; this
/// reaper is the only thing that deletes them.
pub fn cleanup_temp_files(temp_dir: &Path, max_age: Duration) -> AppResult<usize> {
    if !temp_dir.is_dir() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut removed = 0usize;

    for entry in std::fs::read_dir(temp_dir)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());

        match age {
            Some(age) if age > max_age => match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Reaped temp file: {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Cannot remove temp file {}: {}", path.display(), e),
            },
            _ => {}
        }
    }

    if removed > 0 {
        info!("{} Removed {} stale temp files", LOG_OUTPUT, removed);
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_temp_path() {
        // REQUIREMENT: Temp files use unique names under the temp root
        // PURPOSE: Verify uniqueness and filename preservation
        let temp_dir = Path::new("/tmp/fh");

        let a = unique_temp_path(temp_dir, "https://x.org/us-gaap-2024.zip");
        let b = unique_temp_path(temp_dir, "https://x.org/us-gaap-2024.zip");

        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with("us-gaap-2024.zip"));
        assert!(a.starts_with(temp_dir));

        let with_query = unique_temp_path(temp_dir, "https://x.org/doc/content?format=pdf");
        assert!(with_query.to_string_lossy().ends_with("content"));
    }

    #[test]
    fn test_cleanup_temp_files() {
        // REQUIREMENT: Stale temp files are reaped by age
        // PURPOSE: Verify fresh files survive and a zero max-age reaps all
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.zip"), b"x").unwrap();
        std::fs::write(tmp.path().join("b.zip"), b"y").unwrap();

        // Everything is fresh; a one-hour threshold removes nothing
        let removed = cleanup_temp_files(tmp.path(), Duration::from_secs(3600)).unwrap();
        assert_eq!(removed, 0);

        // Zero threshold reaps both
        let removed = cleanup_temp_files(tmp.path(), Duration::ZERO).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);

        // Missing directory is a no-op
        let removed = cleanup_temp_files(&tmp.path().join("ghost"), Duration::ZERO).unwrap();
        assert_eq!(removed, 0);
    }
}
