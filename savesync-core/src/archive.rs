//! Deterministic store-mode zip archives of a directory tree.
//!
//! The produced bytes depend only on the relative paths and contents of the
//! included files:
//! - entries are sorted by their `/`-joined relative path
//! - every entry is stored uncompressed with the zip epoch as its timestamp
//! - permissions are normalized to 0o644

use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::{Result, SyncError};

/// Suffix excluded when none is configured.
pub const DEFAULT_EXCLUDE_SUFFIX: &str = ".bak";

const ENTRY_PERMISSIONS: u32 = 0o644;
// Half the 4 GiB zip32 limit, so a file that grows between the walk and the
// copy still fits the header chosen for it.
const ZIP64_THRESHOLD: u64 = 1 << 31;

/// File-name suffixes that are never archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionFilter {
    suffixes: Vec<String>,
}

impl ExclusionFilter {
    pub fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }

    /// Whether a file with this name must be left out of the archive.
    pub fn is_excluded(&self, file_name: &OsStr) -> bool {
        let name = file_name.to_string_lossy();
        self.suffixes.iter().any(|s| name.ends_with(s.as_str()))
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }
}

impl Default for ExclusionFilter {
    fn default() -> Self {
        Self::new(vec![DEFAULT_EXCLUDE_SUFFIX.to_string()])
    }
}

/// Result of archiving one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Path of the created archive.
    pub path: PathBuf,
    /// Number of file entries written.
    pub entries: usize,
    /// Files left out by the exclusion filter.
    pub skipped: usize,
    /// Total uncompressed bytes of all entries.
    pub bytes: u64,
}

/// A file selected for the archive.
#[derive(Debug)]
struct PendingEntry {
    name: String,
    source: PathBuf,
    len: u64,
}

/// Archive every regular file under `source_dir` into a new zip at `output`.
pub fn archive_directory(
    source_dir: &Path,
    output: &Path,
    filter: &ExclusionFilter,
) -> Result<ArchiveSummary> {
    // Collect before creating the output so it can never list itself.
    let (entries, skipped) = collect_entries(source_dir, filter)?;

    let file = File::create(output).map_err(|e| SyncError::archive(output, e))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));

    let mut bytes = 0u64;
    for entry in &entries {
        writer
            .start_file(entry.name.as_str(), entry_options(entry.len))
            .map_err(|e| SyncError::archive(output, io::Error::other(e)))?;

        let mut input = File::open(&entry.source).map_err(|e| SyncError::archive(&entry.source, e))?;
        bytes += io::copy(&mut input, &mut writer).map_err(|e| SyncError::archive(&entry.source, e))?;
        tracing::debug!(entry = %entry.name, "added archive entry");
    }

    let mut inner = writer
        .finish()
        .map_err(|e| SyncError::archive(output, io::Error::other(e)))?;
    inner.flush().map_err(|e| SyncError::archive(output, e))?;

    tracing::info!(
        archive = %output.display(),
        entries = entries.len(),
        skipped,
        bytes,
        "archive written"
    );

    Ok(ArchiveSummary {
        path: output.to_path_buf(),
        entries: entries.len(),
        skipped,
        bytes,
    })
}

/// Walk `source_dir` and return the included files sorted by entry name,
/// together with the number of excluded files.
fn collect_entries(source_dir: &Path, filter: &ExclusionFilter) -> Result<(Vec<PendingEntry>, usize)> {
    let mut entries = Vec::new();
    let mut skipped = 0usize;

    for item in WalkDir::new(source_dir).follow_links(false) {
        let item = item.map_err(|e| {
            let path = e.path().unwrap_or(source_dir).to_path_buf();
            SyncError::archive(path, io::Error::from(e))
        })?;

        let file_type = item.file_type();
        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            tracing::debug!(path = %item.path().display(), "skipping non-regular file");
            continue;
        }
        if filter.is_excluded(item.file_name()) {
            tracing::debug!(path = %item.path().display(), "skipping excluded file");
            skipped += 1;
            continue;
        }

        let relative = item
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| SyncError::archive(item.path(), io::Error::other(e)))?;
        let name = entry_name(relative).ok_or_else(|| {
            SyncError::archive(
                item.path(),
                io::Error::new(io::ErrorKind::InvalidData, "path is not valid UTF-8"),
            )
        })?;
        let len = item
            .metadata()
            .map_err(|e| SyncError::archive(item.path(), io::Error::from(e)))?
            .len();

        entries.push(PendingEntry {
            name,
            source: item.into_path(),
            len,
        });
    }

    entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
    Ok((entries, skipped))
}

fn entry_options(len: u64) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default())
        .unix_permissions(ENTRY_PERMISSIONS)
        .large_file(needs_zip64(len))
}

fn needs_zip64(len: u64) -> bool {
    len >= ZIP64_THRESHOLD
}

/// Zip entry name for a path relative to the archive root.
fn entry_name(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}
