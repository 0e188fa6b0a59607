//! Backup container access
//!
//! `Manifest.plist` and `Manifest.db` readers.

mod container;
mod manifest_db;

pub use container::{BackupContainer, ContainerError, MANIFEST_DB, MANIFEST_PLIST};
pub use manifest_db::{read_manifest, FileMetadata, ManifestDbError, ManifestFile};
