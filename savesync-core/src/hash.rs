//! Streaming SHA-256 of archive files.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Result, SyncError};

/// Read granularity used while hashing.
pub const HASH_BLOCK_SIZE: usize = 4096;

/// SHA-256 digest of an archive's raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Create a ContentHash from raw digest bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash an in-memory buffer
    pub fn from_data(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Lowercase hexadecimal form, as written to sidecar files
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse sidecar text. Surrounding whitespace is ignored and
    /// uppercase digits are accepted.
    pub fn parse(text: &str) -> std::result::Result<Self, hex::FromHexError> {
        let mut arr = [0u8; 32];
        hex::decode_to_slice(text.trim(), &mut arr)?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Compute the SHA-256 of a file, reading it in fixed-size blocks.
pub fn hash_file(path: &Path) -> Result<ContentHash> {
    let hash_err = |source| SyncError::Hash {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(hash_err)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_BLOCK_SIZE];

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(hash_err(e)),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(ContentHash(hasher.finalize().into()))
}
