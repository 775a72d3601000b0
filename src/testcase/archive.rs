//! Zip import of uploaded case sets
//!
//! The destination is wiped and recreated for every import. Entry names are
//! all checked before the first byte is written, and any failure after that
//! point removes the destination so no partially trusted case set survives.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::config::StorageConfig;
use crate::utils::{UnsafePath, enforce_child_path};

use super::loader::{self, CaseLayout};

/// Unix file-type bits for a symbolic link
const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Archive import errors
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid archive: {0}")]
    InvalidArchive(#[from] ZipError),

    #[error("Unsafe archive entry: {0}")]
    UnsafeEntry(String),

    #[error("Archive expands to more than {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Archive contains no test cases in a supported layout")]
    NoTestCases,
}

impl ImportError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO_ERROR",
            Self::InvalidArchive(_) => "INVALID_ARCHIVE",
            Self::UnsafeEntry(_) => "UNSAFE_ENTRY",
            Self::TooLarge { .. } => "ARCHIVE_TOO_LARGE",
            Self::NoTestCases => "NO_TESTCASES",
        }
    }
}

/// Summary of a successful import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveImport {
    pub layout: CaseLayout,
    pub case_count: usize,
    pub files_written: usize,
}

/// Extracts case archives into case directories
#[derive(Debug, Clone)]
pub struct ArchiveImporter {
    max_extracted_bytes: u64,
}

/// An archive entry that passed validation
struct PlannedEntry {
    index: usize,
    relative: PathBuf,
    is_dir: bool,
}

impl ArchiveImporter {
    pub fn new(max_extracted_bytes: u64) -> Self {
        Self { max_extracted_bytes }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(storage.archive_max_extracted_bytes)
    }

    /// Replace the contents of `dest` with the cases in `archive`.
    pub async fn extract(&self, archive: &Path, dest: &Path) -> Result<ArchiveImport, ImportError> {
        let result = self.extract_inner(archive, dest).await;

        match &result {
            Ok(import) => tracing::info!(
                archive = ?archive,
                dest = ?dest,
                layout = ?import.layout,
                cases = import.case_count,
                files = import.files_written,
                "Imported test case archive"
            ),
            Err(e) => {
                tracing::warn!(
                    archive = ?archive,
                    dest = ?dest,
                    error = %e,
                    code = e.error_code(),
                    "Archive import failed, removing destination"
                );
                match tokio::fs::remove_dir_all(dest).await {
                    Err(cleanup) if cleanup.kind() != io::ErrorKind::NotFound => {
                        tracing::error!(dest = ?dest, error = %cleanup, "Failed to remove destination");
                    }
                    _ => {}
                }
            }
        }

        result
    }

    async fn extract_inner(&self, archive: &Path, dest: &Path) -> Result<ArchiveImport, ImportError> {
        let archive_path = archive.to_path_buf();
        let dest_dir = dest.to_path_buf();
        let limit = self.max_extracted_bytes;

        let files_written = tokio::task::spawn_blocking(move || {
            reset_destination(&dest_dir)?;
            extract_blocking(&archive_path, &dest_dir, limit)
        })
        .await
        .map_err(|e| ImportError::Io(io::Error::other(e)))??;

        let discovery = loader::discover(dest).await?;
        let layout = discovery.layout.ok_or(ImportError::NoTestCases)?;

        Ok(ArchiveImport {
            layout,
            case_count: discovery.cases.len(),
            files_written,
        })
    }
}

fn reset_destination(dest: &Path) -> io::Result<()> {
    match fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(dest)?,
        Ok(_) => fs::remove_file(dest)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(dest)
}

fn extract_blocking(archive_path: &Path, dest: &Path, limit: u64) -> Result<usize, ImportError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    let plan = validate_entries(&mut archive, limit)?;

    let mut written: u64 = 0;
    let mut files_written = 0;
    for entry in plan {
        let out_path = dest.join(&entry.relative);
        if entry.is_dir {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let zip_file = archive.by_index(entry.index)?;
        // Declared sizes were checked up front; this bounds what is actually inflated.
        let remaining = limit.saturating_sub(written);
        let mut out = File::create(&out_path)?;
        let copied = io::copy(&mut zip_file.take(remaining.saturating_add(1)), &mut out)?;
        if copied > remaining {
            return Err(ImportError::TooLarge { limit });
        }
        written += copied;
        files_written += 1;
    }

    Ok(files_written)
}

/// Check every entry before anything is written.
fn validate_entries(archive: &mut ZipArchive<File>, limit: u64) -> Result<Vec<PlannedEntry>, ImportError> {
    let mut plan = Vec::with_capacity(archive.len());
    let mut declared: u64 = 0;

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        let name = entry.name().to_string();

        if entry.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            return Err(ImportError::UnsafeEntry(format!("symbolic link: {name}")));
        }

        let relative = match enforce_child_path(&name) {
            Ok(relative) => relative,
            // A bare "./" directory entry has nothing to create.
            Err(UnsafePath::Empty) if entry.is_dir() && !name.is_empty() => continue,
            Err(e) => return Err(ImportError::UnsafeEntry(e.to_string())),
        };

        declared = declared.saturating_add(entry.size());
        if declared > limit {
            return Err(ImportError::TooLarge { limit });
        }

        plan.push(PlannedEntry {
            index,
            relative,
            is_dir: entry.is_dir(),
        });
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn build_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, contents) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn importer() -> ArchiveImporter {
        ArchiveImporter::new(1024 * 1024)
    }

    #[tokio::test]
    async fn test_import_paired_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("cases.zip");
        build_zip(
            &archive,
            &[
                ("inputs/1.txt", "1 2"),
                ("inputs/2.txt", "3 4"),
                ("inputs/3.txt", "5 6"),
                ("outputs/1.txt", "3"),
                ("outputs/2.txt", "7"),
            ],
        );
        let dest = dir.path().join("cases");

        let import = importer().extract(&archive, &dest).await.unwrap();
        assert_eq!(import.layout, CaseLayout::Paired);
        assert_eq!(import.case_count, 2);
        assert_eq!(import.files_written, 5);

        let cases = loader::load_cases(&dest).await.unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].expected_output, b"7");
    }

    #[tokio::test]
    async fn test_reimport_replaces_stale_cases() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cases");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("9.in"), "stale").unwrap();
        std::fs::write(dest.join("9.out"), "stale").unwrap();

        let archive = dir.path().join("cases.zip");
        build_zip(&archive, &[("1.in", "a"), ("1.out", "b")]);

        let import = importer().extract(&archive, &dest).await.unwrap();
        assert_eq!(import.layout, CaseLayout::Flat);
        assert_eq!(import.case_count, 1);
        assert!(!dest.join("9.in").exists());
    }

    #[tokio::test]
    async fn test_traversal_entry_leaves_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        build_zip(
            &archive,
            &[
                ("inputs/1.txt", "1"),
                ("outputs/1.txt", "1"),
                ("../../evil.txt", "pwned"),
            ],
        );
        let dest = dir.path().join("problems").join("p1");

        let err = importer().extract(&archive, &dest).await.unwrap_err();
        assert!(matches!(err, ImportError::UnsafeEntry(_)));
        assert!(!dest.exists());
        assert!(!dir.path().join("evil.txt").exists());
        assert!(!dir.path().join("problems").join("evil.txt").exists());
    }

    #[tokio::test]
    async fn test_absolute_and_drive_entries_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["/etc/evil", "C:/evil.txt", "inputs\\..\\..\\evil.txt"] {
            let archive = dir.path().join("bad.zip");
            build_zip(&archive, &[("1.in", "a"), ("1.out", "b"), (name, "x")]);
            let dest = dir.path().join("cases");

            let err = importer().extract(&archive, &dest).await.unwrap_err();
            assert_eq!(err.error_code(), "UNSAFE_ENTRY", "entry {name}");
            assert!(!dest.exists());
        }
    }

    #[tokio::test]
    async fn test_archive_without_cases_fails() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("empty.zip");
        build_zip(&archive, &[("README.md", "nothing here"), ("1.in", "orphan")]);
        let dest = dir.path().join("cases");

        let err = importer().extract(&archive, &dest).await.unwrap_err();
        assert!(matches!(err, ImportError::NoTestCases));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_size_cap_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("big.zip");
        let big = "x".repeat(4096);
        build_zip(&archive, &[("1.in", &big), ("1.out", &big)]);
        let dest = dir.path().join("cases");

        let err = ArchiveImporter::new(6000)
            .extract(&archive, &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::TooLarge { limit: 6000 }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_not_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("cases.zip");
        std::fs::write(&archive, "definitely not a zip").unwrap();
        let dest = dir.path().join("cases");

        let err = importer().extract(&archive, &dest).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARCHIVE");
        assert!(!dest.exists());
    }
}
