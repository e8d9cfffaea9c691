//! Duplicate detection against archives already in the shared directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};
use crate::hash::ContentHash;
use crate::origin::OriginTag;
use crate::sync::{ARCHIVE_EXTENSION, SIDECAR_EXTENSION};

/// Which prior archives count as duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupScope {
    /// Only archives produced by this host.
    Host(OriginTag),
    /// Every archive in the shared directory.
    Global,
}

impl DedupScope {
    /// Whether a file name in the shared directory is a sidecar in scope.
    pub fn matches_sidecar(&self, file_name: &str) -> bool {
        match self {
            DedupScope::Host(tag) => file_name.ends_with(&tag.sidecar_suffix()),
            DedupScope::Global => file_name.ends_with(&format!(".{}", SIDECAR_EXTENSION)),
        }
    }
}

/// Map every complete (archive, sidecar) pair in `shared_dir` that falls in
/// `scope` from its content hash to the archive path.
///
/// Sidecars without their archive are ignored. When two sidecars carry the
/// same hash the one sorting last by file name wins.
pub fn find_existing(shared_dir: &Path, scope: &DedupScope) -> Result<HashMap<ContentHash, PathBuf>> {
    let scan_err = |path: &Path, source| SyncError::Scan {
        path: path.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(shared_dir).map_err(|e| scan_err(shared_dir, e))? {
        let entry = entry.map_err(|e| scan_err(shared_dir, e))?;
        if let Ok(name) = entry.file_name().into_string() {
            if scope.matches_sidecar(&name) {
                names.push(name);
            }
        }
    }
    names.sort();

    let mut existing = HashMap::new();
    for name in names {
        let sidecar = shared_dir.join(&name);
        let archive = sidecar.with_extension(ARCHIVE_EXTENSION);

        if !sidecar.is_file() || !archive.is_file() {
            tracing::debug!(sidecar = %sidecar.display(), "ignoring incomplete pair");
            continue;
        }

        let raw = fs::read(&sidecar).map_err(|e| scan_err(&sidecar, e))?;
        let parsed = std::str::from_utf8(&raw)
            .map_err(|e| e.to_string())
            .and_then(|text| ContentHash::parse(text).map_err(|e| e.to_string()));
        let hash = match parsed {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(sidecar = %sidecar.display(), "ignoring malformed checksum file: {}", e);
                continue;
            }
        };

        if let Some(previous) = existing.insert(hash, archive) {
            tracing::debug!(
                hash = %hash,
                replaced = %previous.display(),
                "duplicate hash among stored archives"
            );
        }
    }

    tracing::info!(
        shared_dir = %shared_dir.display(),
        archives = existing.len(),
        "loaded existing checksums"
    );
    Ok(existing)
}
