//! Sync orchestration: archive, hash, check for a duplicate, then either
//! discard the new archive or move it with its checksum file into the
//! shared directory.

use chrono::{Local, NaiveDateTime};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::archive::archive_directory;
use crate::config::SyncSettings;
use crate::dedup::find_existing;
use crate::error::{Result, SyncError};
use crate::hash::{hash_file, ContentHash};
use crate::origin::OriginTag;

/// Extension of archive files.
pub const ARCHIVE_EXTENSION: &str = "zip";
/// Extension of checksum sidecar files.
pub const SIDECAR_EXTENSION: &str = "sha256";
/// Timestamp embedded in archive names: sortable and filesystem-safe.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// File name of the archive created at `timestamp` by `origin`.
pub fn archive_file_name(timestamp: NaiveDateTime, origin: &OriginTag) -> String {
    format!(
        "save_{}_{}.{}",
        timestamp.format(TIMESTAMP_FORMAT),
        origin,
        ARCHIVE_EXTENSION
    )
}

/// Checksum file belonging to an archive.
pub fn sidecar_path(archive: &Path) -> PathBuf {
    archive.with_extension(SIDECAR_EXTENSION)
}

/// Progress notifications emitted while a sync runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    ArchiveCreated { archive: PathBuf, entries: usize },
    Hashed { archive: PathBuf, hash: ContentHash },
    DuplicateFound { existing: PathBuf },
    LocalArchiveDeleted { archive: PathBuf },
    SidecarCreated { sidecar: PathBuf },
    FilesMoved { share_path: PathBuf },
}

/// How a successful sync ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// An identical archive was already stored; nothing was moved.
    Duplicate { hash: ContentHash, existing: PathBuf },
    /// The new archive and its checksum file are now in the shared directory.
    Persisted {
        hash: ContentHash,
        archive: PathBuf,
        sidecar: PathBuf,
    },
}

impl SyncOutcome {
    pub fn hash(&self) -> &ContentHash {
        match self {
            SyncOutcome::Duplicate { hash, .. } | SyncOutcome::Persisted { hash, .. } => hash,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, SyncOutcome::Duplicate { .. })
    }
}

/// Runs syncs for one configuration.
pub struct Syncer {
    settings: SyncSettings,
}

impl Syncer {
    pub fn new(settings: SyncSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Confirm the save, shared and work directories exist.
    pub fn check(&self) -> Result<()> {
        require_dir(&self.settings.save_dir)?;
        require_dir(&self.settings.share_path)?;
        require_dir(&self.settings.work_dir)?;
        if same_dir(&self.settings.work_dir, &self.settings.share_path)? {
            return Err(SyncError::Validation {
                path: self.settings.work_dir.clone(),
                reason: "is the shared directory; archives must be built elsewhere".to_string(),
            });
        }
        Ok(())
    }

    /// Sync using the current local time for the archive name.
    pub fn sync(&self, observer: &mut dyn FnMut(&SyncEvent)) -> Result<SyncOutcome> {
        self.sync_at(Local::now().naive_local(), observer)
    }

    /// Sync with an explicit archive timestamp.
    pub fn sync_at(
        &self,
        timestamp: NaiveDateTime,
        observer: &mut dyn FnMut(&SyncEvent),
    ) -> Result<SyncOutcome> {
        self.check()?;
        let settings = &self.settings;

        // Start -> Archived
        let local_archive = settings
            .work_dir
            .join(archive_file_name(timestamp, &settings.origin));
        let summary = archive_directory(&settings.save_dir, &local_archive, &settings.filter)?;
        observer(&SyncEvent::ArchiveCreated {
            archive: local_archive.clone(),
            entries: summary.entries,
        });

        // Archived -> Hashed
        let hash = hash_file(&local_archive)?;
        tracing::info!(archive = %local_archive.display(), %hash, "archive hashed");
        observer(&SyncEvent::Hashed {
            archive: local_archive.clone(),
            hash,
        });

        // Hashed -> Duplicate
        let existing = find_existing(&settings.share_path, &settings.scope)?;
        if let Some(identical) = existing.get(&hash) {
            tracing::info!(existing = %identical.display(), "identical archive already stored");
            observer(&SyncEvent::DuplicateFound {
                existing: identical.clone(),
            });
            fs::remove_file(&local_archive).map_err(|e| SyncError::archive(&local_archive, e))?;
            observer(&SyncEvent::LocalArchiveDeleted {
                archive: local_archive,
            });
            return Ok(SyncOutcome::Duplicate {
                hash,
                existing: identical.clone(),
            });
        }

        // Hashed -> Persisted
        let local_sidecar = sidecar_path(&local_archive);
        fs::write(&local_sidecar, hash.to_hex()).map_err(|e| SyncError::Sidecar {
            path: local_sidecar.clone(),
            source: e,
        })?;
        observer(&SyncEvent::SidecarCreated {
            sidecar: local_sidecar.clone(),
        });

        // The sidecar goes last: its presence marks a complete pair.
        let archive = relocate(&local_archive, &settings.share_path)?;
        let sidecar = relocate(&local_sidecar, &settings.share_path)?;
        tracing::info!(archive = %archive.display(), "archive stored");
        observer(&SyncEvent::FilesMoved {
            share_path: settings.share_path.clone(),
        });

        Ok(SyncOutcome::Persisted {
            hash,
            archive,
            sidecar,
        })
    }
}

fn require_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        let reason = if path.exists() {
            "is not a directory!"
        } else {
            "does not exist!"
        };
        return Err(SyncError::Validation {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        });
    }
    Ok(())
}

fn same_dir(a: &Path, b: &Path) -> Result<bool> {
    let canonical = |path: &Path| {
        fs::canonicalize(path).map_err(|e| SyncError::Validation {
            path: path.to_path_buf(),
            reason: format!("cannot be resolved: {}", e),
        })
    };
    Ok(canonical(a)? == canonical(b)?)
}

/// Move `file` into `dir`, keeping its name. Never overwrites.
///
/// Falls back to copy-then-delete when a rename is impossible, e.g. when the
/// shared directory is on another filesystem.
fn relocate(file: &Path, dir: &Path) -> Result<PathBuf> {
    let name = file.file_name().ok_or_else(|| SyncError::Relocation {
        from: file.to_path_buf(),
        to: dir.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"),
    })?;
    let target = dir.join(name);
    let reloc_err = |source| SyncError::Relocation {
        from: file.to_path_buf(),
        to: target.clone(),
        source,
    };

    if target.exists() {
        return Err(reloc_err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "destination already exists",
        )));
    }

    if let Err(e) = fs::rename(file, &target) {
        tracing::debug!(from = %file.display(), "rename failed ({}), copying instead", e);
        copy_into_place(file, &target, |from, to| fs::copy(from, to)).map_err(reloc_err)?;
    }

    Ok(target)
}

/// Copy `file` to `<target>.part`, rename that to `target`, then delete
/// `file`. The `.part` file never outlives a failure.
fn copy_into_place(
    file: &Path,
    target: &Path,
    copy: impl Fn(&Path, &Path) -> io::Result<u64>,
) -> io::Result<()> {
    let mut partial = target.to_path_buf().into_os_string();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    if let Err(e) = copy(file, &partial).and_then(|_| fs::rename(&partial, target)) {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }
    fs::remove_file(file)
}
