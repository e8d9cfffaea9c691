//! Savesync Core Library
//!
//! Backs up a directory into a shared directory as content-hashed zip
//! archives:
//! - Deterministic store-mode archiving with suffix exclusion
//! - Streaming SHA-256 checksums
//! - Duplicate detection against previously stored archives
//! - Sync orchestration and JSON configuration

pub mod archive;
pub mod config;
pub mod dedup;
pub mod error;
pub mod hash;
pub mod origin;
pub mod sync;

pub use archive::{archive_directory, ArchiveSummary, ExclusionFilter};
pub use config::{DedupMode, SyncConfig, SyncSettings, CONFIG_FILE};
pub use dedup::{find_existing, DedupScope};
pub use error::{Result, SyncError};
pub use hash::{hash_file, ContentHash};
pub use origin::OriginTag;
pub use sync::{archive_file_name, sidecar_path, SyncEvent, SyncOutcome, Syncer};
