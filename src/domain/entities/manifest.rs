//! Manifest entries
//!
//! One entry per row of the backup's `Files` index.

use crate::domain::entities::ProtectionClass;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};

/// Kind of a manifest entry, from the `flags` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other(i64),
}

impl From<i64> for EntryKind {
    fn from(flags: i64) -> Self {
        match flags {
            1 => EntryKind::File,
            2 => EntryKind::Directory,
            4 => EntryKind::Symlink,
            other => EntryKind::Other(other),
        }
    }
}

impl EntryKind {
    pub fn flags(&self) -> i64 {
        match self {
            EntryKind::File => 1,
            EntryKind::Directory => 2,
            EntryKind::Symlink => 4,
            EntryKind::Other(flags) => *flags,
        }
    }
}

/// A file recorded in the backup manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Content identifier, `sha1("<domain>-<relative path>")`
    pub file_id: String,
    pub domain: String,
    pub relative_path: String,
    pub kind: EntryKind,
    pub protection_class: Option<ProtectionClass>,
    /// Class-prefixed wrapped per-file key
    pub encryption_key: Option<Vec<u8>>,
    pub size: Option<u64>,
}

impl ManifestEntry {
    /// Location of this entry inside a backup tree (`<id[0..2]>/<id>`)
    pub fn storage_path(&self, root: &Path) -> PathBuf {
        storage_path(root, &self.file_id)
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn has_valid_file_id(&self) -> bool {
        is_valid_file_id(&self.file_id)
    }
}

/// A content identifier is 40 lowercase hex digits. Anything else must never
/// be joined onto a backup or output path.
pub fn is_valid_file_id(id: &str) -> bool {
    id.len() == 40 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Computes the content identifier of a domain/path pair.
pub fn file_id(domain: &str, relative_path: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(domain.as_bytes());
    hasher.update(b"-");
    hasher.update(relative_path.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolves a content identifier to its path under a backup root.
///
/// `file_id` is trusted; check identifiers read from a manifest with
/// [`is_valid_file_id`] first.
pub fn storage_path(root: &Path, file_id: &str) -> PathBuf {
    let prefix = file_id.get(0..2).unwrap_or(file_id);
    root.join(prefix).join(file_id)
}
