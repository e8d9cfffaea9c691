//! Configuration file handling.
//!
//! The configuration is a JSON document, `config.json` in the working
//! directory by default:
//!
//! ```json
//! {
//!     "save_dir": "/home/me/game/saves",
//!     "share_path": "/mnt/nas/backups",
//!     "dedup_scope": "host"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::{ExclusionFilter, DEFAULT_EXCLUDE_SUFFIX};
use crate::dedup::DedupScope;
use crate::error::{Result, SyncError};
use crate::origin::OriginTag;

/// Default configuration file name, resolved against the working directory.
pub const CONFIG_FILE: &str = "config.json";

/// How far duplicate detection looks in the shared directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupMode {
    /// Only this host's own archives.
    #[default]
    Host,
    /// Every archive regardless of origin.
    Global,
}

/// Configuration as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Directory to archive.
    #[serde(default)]
    pub save_dir: PathBuf,
    /// Shared directory receiving archives.
    #[serde(default, alias = "sync_path")]
    pub share_path: PathBuf,
    #[serde(default)]
    pub dedup_scope: DedupMode,
    /// Overrides the system hostname as origin tag.
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default = "default_exclude_suffixes")]
    pub exclude_suffixes: Vec<String>,
    /// Where archives are built before being moved.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

fn default_exclude_suffixes() -> Vec<String> {
    vec![DEFAULT_EXCLUDE_SUFFIX.to_string()]
}

impl SyncConfig {
    pub fn new(save_dir: impl Into<PathBuf>, share_path: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            share_path: share_path.into(),
            dedup_scope: DedupMode::default(),
            hostname: None,
            exclude_suffixes: default_exclude_suffixes(),
            work_dir: None,
        }
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| SyncError::config(path, e))?;
        let config: SyncConfig = serde_json::from_str(&data).map_err(|e| SyncError::config(path, e))?;
        config.validate().map_err(|reason| SyncError::config(path, reason))?;
        tracing::debug!(config = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).map_err(|e| SyncError::config(path, e))?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, data).map_err(|e| SyncError::config(path, e))?;
        fs::rename(&tmp_path, path).map_err(|e| SyncError::config(path, e))?;
        Ok(())
    }

    /// Check field values that do not need the filesystem.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.save_dir.as_os_str().is_empty() {
            return Err("'save_dir' is not set".to_string());
        }
        if self.share_path.as_os_str().is_empty() {
            return Err("'share_path' is not set".to_string());
        }
        if self.exclude_suffixes.iter().any(|s| s.is_empty()) {
            return Err("'exclude_suffixes' must not contain empty strings".to_string());
        }
        if let Some(name) = &self.hostname {
            OriginTag::new(name.as_str())?;
        }
        Ok(())
    }

    /// Turn the configuration into runtime settings, reading the system
    /// hostname unless one is configured.
    pub fn resolve(&self, config_path: &Path) -> Result<SyncSettings> {
        let origin = match &self.hostname {
            Some(name) => OriginTag::new(name.as_str()),
            None => OriginTag::from_system(),
        }
        .map_err(|reason| SyncError::config(config_path, reason))?;

        let scope = match self.dedup_scope {
            DedupMode::Host => DedupScope::Host(origin.clone()),
            DedupMode::Global => DedupScope::Global,
        };

        Ok(SyncSettings {
            save_dir: self.save_dir.clone(),
            share_path: self.share_path.clone(),
            work_dir: self.work_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
            origin,
            scope,
            filter: ExclusionFilter::new(self.exclude_suffixes.clone()),
        })
    }
}

/// Everything a sync needs, with the origin tag already resolved.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub save_dir: PathBuf,
    pub share_path: PathBuf,
    pub work_dir: PathBuf,
    pub origin: OriginTag,
    pub scope: DedupScope,
    pub filter: ExclusionFilter,
}
