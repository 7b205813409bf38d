use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use filing_hub_core::config::SafetyConfig;
use filing_hub_core::logging::{LOG_INPUT, LOG_OUTPUT, LOG_PROCESS};

use crate::result::ExtractionResult;

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
}

impl ArchiveKind {
    /// Detect the format from the filename. Compound extensions are matched
    /// before simple ones.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let name = filename.to_lowercase();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Some(ArchiveKind::TarBz2)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(ArchiveKind::TarXz)
        } else if name.ends_with(".tar") {
            Some(ArchiveKind::Tar)
        } else if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else {
            None
        }
    }
}

/// Format-dispatched archive extractor with safety guards.
///
/// Before any member is written the whole archive is validated: every member
/// path must stay lexically inside the target directory, no path may exceed
/// the depth limit, and the declared uncompressed sizes must sum below the
/// size limit.
pub struct ArchiveHandler {
    safety: SafetyConfig,
}

impl ArchiveHandler {
    pub fn new(safety: SafetyConfig) -> Self {
        Self { safety }
    }

    /// Extract an archive into `target_dir`.
    ///
    /// Failures (bad archive, unsafe members, unsupported format) come back
    /// in the `ExtractionResult`; nothing is thrown past this boundary. On
    /// success the source archive is deleted when `cleanup_archive` is set.
    pub fn extract(
        &self,
        archive_path: &Path,
        target_dir: &Path,
        cleanup_archive: bool,
    ) -> ExtractionResult {
        let filename = archive_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("");

        info!("{} Processing archive: {}", LOG_INPUT, filename);

        let start = Instant::now();

        let Some(kind) = ArchiveKind::from_filename(filename) else {
            let message = format!("unsupported_format: {}", filename);
            warn!("{} {}", LOG_OUTPUT, message);
            let mut result = ExtractionResult::failed(message);
            result.archive_path = Some(archive_path.to_path_buf());
            result.extract_directory = Some(target_dir.to_path_buf());
            return result;
        };

        let mut result = match kind {
            ArchiveKind::Zip => self.extract_zip(archive_path, target_dir),
            _ => self.extract_tar(archive_path, target_dir, kind),
        };

        result.archive_path = Some(archive_path.to_path_buf());
        result.extract_directory = Some(target_dir.to_path_buf());
        result.duration = start.elapsed();

        if result.success {
            info!(
                "{} Extraction complete: {} files in {:.2}s",
                LOG_OUTPUT,
                result.files_extracted,
                result.duration.as_secs_f64()
            );

            if cleanup_archive {
                if let Err(e) = std::fs::remove_file(archive_path) {
                    warn!("Cannot delete archive {}: {}", archive_path.display(), e);
                } else {
                    info!("{} Deleted archive: {}", LOG_PROCESS, filename);
                }
            }
        }

        result
    }

    fn extract_zip(&self, archive_path: &Path, target_dir: &Path) -> ExtractionResult {
        let file = match File::open(archive_path) {
            Ok(file) => file,
            Err(e) => return ExtractionResult::failed(format!("Cannot open archive: {}", e)),
        };

        let mut zip = match zip::ZipArchive::new(file) {
            Ok(zip) => zip,
            Err(e) => return ExtractionResult::failed(format!("Invalid ZIP file: {}", e)),
        };

        // Validate every member before writing anything
        let mut total_size: u64 = 0;
        for i in 0..zip.len() {
            let entry = match zip.by_index(i) {
                Ok(entry) => entry,
                Err(e) => return ExtractionResult::failed(format!("Invalid ZIP entry: {}", e)),
            };

            if let Some(failure) = self.validate_member(entry.name(), target_dir) {
                return ExtractionResult::failed(failure);
            }

            total_size = total_size.saturating_add(entry.size());
        }

        if total_size > self.safety.max_archive_size {
            return ExtractionResult::failed(format!(
                "Archive too large: {} bytes (limit {})",
                total_size, self.safety.max_archive_size
            ));
        }

        info!("{} Extracting {} entries...", LOG_PROCESS, zip.len());

        if let Err(e) = std::fs::create_dir_all(target_dir) {
            return ExtractionResult::failed(format!("Cannot create target directory: {}", e));
        }

        let mut files_extracted = 0usize;
        for i in 0..zip.len() {
            let mut entry = match zip.by_index(i) {
                Ok(entry) => entry,
                Err(e) => return ExtractionResult::failed(format!("Invalid ZIP entry: {}", e)),
            };

            let Some(relative) = sanitize_member_path(entry.name()) else {
                // Already validated; a disagreement here means skip
                continue;
            };
            let out_path = target_dir.join(relative);

            if entry.is_dir() {
                if let Err(e) = std::fs::create_dir_all(&out_path) {
                    return ExtractionResult::failed(format!("Cannot create directory: {}", e));
                }
                continue;
            }

            if let Some(parent) = out_path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return ExtractionResult::failed(format!("Cannot create directory: {}", e));
                }
            }

            let mut out_file = match File::create(&out_path) {
                Ok(file) => file,
                Err(e) => return ExtractionResult::failed(format!("Cannot create file: {}", e)),
            };

            if let Err(e) = std::io::copy(&mut entry, &mut out_file) {
                return ExtractionResult::failed(format!("ZIP extraction failed: {}", e));
            }

            files_extracted += 1;
        }

        ExtractionResult {
            success: true,
            files_extracted,
            ..Default::default()
        }
    }

    fn extract_tar(
        &self,
        archive_path: &Path,
        target_dir: &Path,
        kind: ArchiveKind,
    ) -> ExtractionResult {
        // Pass 1: validate all entries without writing
        let reader = match open_tar_reader(archive_path, kind) {
            Ok(reader) => reader,
            Err(e) => return ExtractionResult::failed(format!("Cannot open archive: {}", e)),
        };
        let mut archive = tar::Archive::new(reader);

        let entries = match archive.entries() {
            Ok(entries) => entries,
            Err(e) => return ExtractionResult::failed(format!("Invalid TAR file: {}", e)),
        };

        let mut total_size: u64 = 0;
        let mut file_count = 0usize;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return ExtractionResult::failed(format!("Invalid TAR entry: {}", e)),
            };

            let path = match entry.path() {
                Ok(path) => path.into_owned(),
                Err(e) => return ExtractionResult::failed(format!("Invalid TAR path: {}", e)),
            };

            let name = path.to_string_lossy();
            if let Some(failure) = self.validate_member(&name, target_dir) {
                return ExtractionResult::failed(failure);
            }

            if entry.header().entry_type().is_file() {
                file_count += 1;
                total_size = total_size.saturating_add(entry.header().size().unwrap_or(0));
            }
        }

        if total_size > self.safety.max_archive_size {
            return ExtractionResult::failed(format!(
                "Archive too large: {} bytes (limit {})",
                total_size, self.safety.max_archive_size
            ));
        }

        // Pass 2: reopen and extract
        info!("{} Extracting {} items...", LOG_PROCESS, file_count);

        if let Err(e) = std::fs::create_dir_all(target_dir) {
            return ExtractionResult::failed(format!("Cannot create target directory: {}", e));
        }

        let reader = match open_tar_reader(archive_path, kind) {
            Ok(reader) => reader,
            Err(e) => return ExtractionResult::failed(format!("Cannot open archive: {}", e)),
        };
        let mut archive = tar::Archive::new(reader);

        if let Err(e) = archive.unpack(target_dir) {
            return ExtractionResult::failed(format!("TAR extraction failed: {}", e));
        }

        ExtractionResult {
            success: true,
            files_extracted: file_count,
            ..Default::default()
        }
    }

    /// Validate one member path: lexical containment plus depth.
    /// Returns the failure reason, or `None` when the member is safe.
    fn validate_member(&self, member_name: &str, _target_dir: &Path) -> Option<String> {
        let Some(relative) = sanitize_member_path(member_name) else {
            return Some(format!("unsafe_paths: {}", member_name));
        };

        let depth = relative.components().count();
        if depth > self.safety.max_extraction_depth {
            return Some(format!(
                "Path too deep: {} (depth={}, limit={})",
                member_name, depth, self.safety.max_extraction_depth
            ));
        }

        None
    }
}

/// Resolve a member name to a safe relative path.
///
/// Rejects absolute paths and any `..` component: after normalization the
/// member must remain lexically inside the extraction root. This is an
/// explicit predicate; no filesystem access is involved.
pub fn sanitize_member_path(member_name: &str) -> Option<PathBuf> {
    let path = Path::new(member_name);
    let mut clean = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            // Parent traversal, absolute roots, and prefixes all escape
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

fn open_tar_reader(
    archive_path: &Path,
    kind: ArchiveKind,
) -> std::io::Result<Box<dyn Read>> {
    let file = File::open(archive_path)?;

    Ok(match kind {
        ArchiveKind::Tar => Box::new(file),
        ArchiveKind::TarGz => Box::new(flate2::read::GzDecoder::new(file)),
        ArchiveKind::TarBz2 => Box::new(bzip2::read::BzDecoder::new(file)),
        ArchiveKind::TarXz => Box::new(xz2::read::XzDecoder::new(file)),
        ArchiveKind::Zip => Box::new(file),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn safety() -> SafetyConfig {
        SafetyConfig {
            max_archive_size: 1024 * 1024,
            max_extraction_depth: 5,
            min_file_size: 1,
        }
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();

        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_archive_kind_detection() {
        // REQUIREMENT: Format is dispatched by suffix, compound extensions first
        // PURPOSE: Verify every supported extension maps to its kind
        assert_eq!(ArchiveKind::from_filename("t.zip"), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::from_filename("t.tar"), Some(ArchiveKind::Tar));
        assert_eq!(ArchiveKind::from_filename("t.tar.gz"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_filename("t.TGZ"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_filename("t.tar.bz2"), Some(ArchiveKind::TarBz2));
        assert_eq!(ArchiveKind::from_filename("t.tar.xz"), Some(ArchiveKind::TarXz));
        assert_eq!(ArchiveKind::from_filename("t.rar"), None);
    }

    #[test]
    fn test_zip_extraction() {
        // REQUIREMENT: ZIP archives extract all members into the target
        // PURPOSE: Verify the success path end to end on disk
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("filing.zip");
        let target = tmp.path().join("out");

        write_zip(
            &archive,
            &[
                ("instance.xhtml", b"<html/>" as &[u8]),
                ("linkbases/pre.xml", b"<linkbase/>"),
            ],
        );

        let handler = ArchiveHandler::new(safety());
        let result = handler.extract(&archive, &target, true);

        assert!(result.success, "{:?}", result.error_message);
        assert_eq!(result.files_extracted, 2);
        assert!(target.join("instance.xhtml").is_file());
        assert!(target.join("linkbases/pre.xml").is_file());
        // cleanup_archive removed the source
        assert!(!archive.exists());
    }

    #[test]
    fn test_path_traversal_is_rejected() {
        // REQUIREMENT: No extracted path may lie outside the target directory
        // PURPOSE: Verify traversal members fail the whole archive before any write
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("evil.zip");
        let target = tmp.path().join("out");

        write_zip(
            &archive,
            &[
                ("ok.txt", b"fine" as &[u8]),
                ("../escape.txt", b"evil"),
            ],
        );

        let handler = ArchiveHandler::new(safety());
        let result = handler.extract(&archive, &target, false);

        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("unsafe_paths"));
        // Nothing was written, not even the safe member
        assert!(!target.join("ok.txt").exists());
        // Failed extraction keeps the archive for post-mortem
        assert!(archive.exists());
    }

    #[test]
    fn test_depth_limit() {
        // REQUIREMENT: Member depth beyond the limit is rejected
        // PURPOSE: Verify a member one level past the cap fails the archive
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("deep.zip");
        let target = tmp.path().join("out");

        // depth 6 with a limit of 5
        write_zip(&archive, &[("a/b/c/d/e/f.txt", b"deep" as &[u8])]);

        let handler = ArchiveHandler::new(safety());
        let result = handler.extract(&archive, &target, false);

        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("too deep"));

        // Exactly at the limit is fine
        let archive_ok = tmp.path().join("ok.zip");
        write_zip(&archive_ok, &[("a/b/c/d/e.txt", b"ok" as &[u8])]);
        let result = handler.extract(&archive_ok, &target, false);
        assert!(result.success);
    }

    #[test]
    fn test_size_limit_rejects_before_writing() {
        // REQUIREMENT: Declared sizes beyond max_archive_size reject the archive
        //              without writing any member
        // PURPOSE: Verify the size guard runs ahead of extraction
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("big.zip");
        let target = tmp.path().join("out");

        let big = vec![0u8; 4096];
        write_zip(&archive, &[("big.bin", big.as_slice())]);

        let tight = SafetyConfig {
            max_archive_size: 1024,
            max_extraction_depth: 5,
            min_file_size: 1,
        };
        let handler = ArchiveHandler::new(tight);
        let result = handler.extract(&archive, &target, false);

        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("too large"));
        assert!(!target.join("big.bin").exists());
    }

    #[test]
    fn test_unsupported_format() {
        // REQUIREMENT: Unknown suffixes return unsupported_format, not a panic
        // PURPOSE: Verify the structured failure for foreign archive types
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("filing.rar");
        std::fs::write(&archive, b"not really an archive").unwrap();

        let handler = ArchiveHandler::new(safety());
        let result = handler.extract(&archive, &tmp.path().join("out"), false);

        assert!(!result.success);
        assert!(result
            .error_message
            .unwrap()
            .contains("unsupported_format"));
    }

    #[test]
    fn test_corrupt_zip() {
        // REQUIREMENT: Malformed archives produce a structured failure
        // PURPOSE: Verify BadArchive surfaces as an error message
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("corrupt.zip");
        std::fs::write(&archive, b"definitely not a zip file").unwrap();

        let handler = ArchiveHandler::new(safety());
        let result = handler.extract(&archive, &tmp.path().join("out"), false);

        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("Invalid ZIP"));
    }

    #[test]
    fn test_tar_gz_extraction() {
        // REQUIREMENT: tar.gz archives are supported alongside zip
        // PURPOSE: Verify the two-pass tar path with gzip compression
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("taxo.tar.gz");
        let target = tmp.path().join("out");

        {
            let file = File::create(&archive).unwrap();
            let gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(gz);

            let data = b"<schema/>";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, "core.xsd", data.as_slice()).unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let handler = ArchiveHandler::new(safety());
        let result = handler.extract(&archive, &target, false);

        assert!(result.success, "{:?}", result.error_message);
        assert_eq!(result.files_extracted, 1);
        assert_eq!(
            std::fs::read_to_string(target.join("core.xsd")).unwrap(),
            "<schema/>"
        );
    }

    #[test]
    fn test_sanitize_member_path() {
        // REQUIREMENT: Containment is an explicit predicate on the member path
        // PURPOSE: Verify the lexical rules directly
        assert_eq!(
            sanitize_member_path("a/b/c.txt"),
            Some(PathBuf::from("a/b/c.txt"))
        );
        assert_eq!(
            sanitize_member_path("./a/c.txt"),
            Some(PathBuf::from("a/c.txt"))
        );
        assert_eq!(sanitize_member_path("../evil.txt"), None);
        assert_eq!(sanitize_member_path("a/../../evil.txt"), None);
        assert_eq!(sanitize_member_path("/etc/passwd"), None);
        assert_eq!(sanitize_member_path(""), None);
    }
}
