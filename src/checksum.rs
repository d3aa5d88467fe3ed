//! Content fingerprints for incremental rebuilds
//!
//! A fingerprint is a SHA256 digest over every file below a directory, fed
//! in a stable order as `lowercased relative path, file bytes`. It only
//! answers "did anything change since last time", so it is not meant to be
//! collision resistant against an adversary.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::Result;

/// Hex-encoded SHA256 digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Fingerprint of the directory tree at `root`.
    /// An absent or empty directory yields an empty checksum.
    pub fn of_tree(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Ok(Self::default());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push((relative.to_lowercase(), relative, entry.into_path()));
        }

        if files.is_empty() {
            return Ok(Self::default());
        }
        files.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut hasher = Sha256::new();
        for (lowered, _, path) in &files {
            hasher.update(lowered.as_bytes());
            hasher.update(fs::read(path)?);
        }
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Verify that `data` hashes to this checksum
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::from_bytes(data) == *self
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.0
    }
}

/// Hex fingerprint of everything under `root`; empty if there are no files
pub fn fingerprint(root: &Path) -> Result<String> {
    Checksum::of_tree(root).map(String::from)
}
