//! Backup container
//!
//! Reads `Manifest.plist` at the backup root: the keybag, the wrapped
//! manifest database key and the encryption flag.

use plist::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const MANIFEST_PLIST: &str = "Manifest.plist";
pub const MANIFEST_DB: &str = "Manifest.db";

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("{0} is not a backup folder (no Manifest.plist)")]
    NotABackup(PathBuf),

    #[error("Cannot parse {path}: {source}")]
    Plist {
        path: PathBuf,
        #[source]
        source: plist::Error,
    },

    #[error("{path} has no {field}")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An on-disk backup folder.
#[derive(Debug, Clone)]
pub struct BackupContainer {
    root: PathBuf,
    keybag: Vec<u8>,
    manifest_key: Option<Vec<u8>>,
    encrypted: bool,
}

impl BackupContainer {
    pub fn open(root: &Path) -> Result<Self, ContainerError> {
        let path = root.join(MANIFEST_PLIST);
        if !path.is_file() {
            return Err(ContainerError::NotABackup(root.to_path_buf()));
        }

        let value = Value::from_file(&path).map_err(|source| ContainerError::Plist {
            path: path.clone(),
            source,
        })?;
        let missing = |field| ContainerError::MissingField {
            path: path.clone(),
            field,
        };
        let dict = value.as_dictionary().ok_or_else(|| missing("root dictionary"))?;

        let keybag = dict
            .get("BackupKeyBag")
            .and_then(Value::as_data)
            .ok_or_else(|| missing("BackupKeyBag"))?
            .to_vec();
        let manifest_key = dict
            .get("ManifestKey")
            .and_then(Value::as_data)
            .map(<[u8]>::to_vec);
        let encrypted = dict
            .get("IsEncrypted")
            .and_then(Value::as_boolean)
            .unwrap_or(false);

        debug!(
            "Opened backup at {} (encrypted: {}, keybag {} bytes)",
            root.display(),
            encrypted,
            keybag.len()
        );

        Ok(Self {
            root: root.to_path_buf(),
            keybag,
            manifest_key,
            encrypted,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn keybag_bytes(&self) -> &[u8] {
        &self.keybag
    }

    /// Class-prefixed wrapped key of `Manifest.db`
    pub fn manifest_key(&self) -> Option<&[u8]> {
        self.manifest_key.as_deref()
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn manifest_db_path(&self) -> PathBuf {
        self.root.join(MANIFEST_DB)
    }

    pub fn read_manifest_db(&self) -> Result<Vec<u8>, ContainerError> {
        let path = self.manifest_db_path();
        fs::read(&path).map_err(|source| ContainerError::Io { path, source })
    }

    /// Property list files at the backup root, copied verbatim on decryption
    pub fn root_plists(&self) -> Result<Vec<PathBuf>, ContainerError> {
        let entries = fs::read_dir(&self.root).map_err(|source| ContainerError::Io {
            path: self.root.clone(),
            source,
        })?;

        let mut plists: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "plist"))
            .collect();
        plists.sort();
        Ok(plists)
    }
}
