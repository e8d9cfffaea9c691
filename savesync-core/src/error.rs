//! Error types shared by every stage of a sync.

use std::path::PathBuf;

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while loading configuration or running a sync
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Configuration file '{}' could not be read: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("Directory '{}' {reason}", path.display())]
    Validation { path: PathBuf, reason: String },

    #[error("Failed to archive '{}': {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to hash '{}': {source}", path.display())]
    Hash {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write checksum file '{}': {source}", path.display())]
    Sidecar {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to scan '{}': {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move '{}' to '{}': {source}", from.display(), to.display())]
    Relocation {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub(crate) fn archive(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Archive {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SyncError::Config {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error happened before anything was written.
    pub fn is_preflight(&self) -> bool {
        matches!(self, SyncError::Config { .. } | SyncError::Validation { .. })
    }
}
