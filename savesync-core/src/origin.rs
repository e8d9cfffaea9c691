//! Host identity embedded in archive names.

use std::fmt;

/// Tag naming the machine that produced an archive.
///
/// Appears as the last `_`-separated component of every archive and sidecar
/// name, and scopes duplicate lookups in [`crate::DedupScope::Host`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginTag(String);

impl OriginTag {
    /// Validate a tag. It must be non-empty and usable inside a file name.
    pub fn new(tag: impl Into<String>) -> Result<Self, String> {
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err("host tag must not be empty".to_string());
        }
        if tag.contains(['/', '\\']) || tag.contains('\0') {
            return Err(format!("host tag '{}' contains a path separator", tag));
        }
        Ok(Self(tag))
    }

    /// Tag for the local machine, from its network name.
    pub fn from_system() -> Result<Self, String> {
        let name = hostname::get().map_err(|e| format!("cannot read hostname: {}", e))?;
        let name = name
            .into_string()
            .map_err(|raw| format!("hostname {:?} is not valid UTF-8", raw))?;
        Self::new(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Suffix shared by every sidecar this host writes.
    pub fn sidecar_suffix(&self) -> String {
        format!("_{}.{}", self.0, crate::sync::SIDECAR_EXTENSION)
    }
}

impl fmt::Display for OriginTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
