//! Decrypt backup use case
//!
//! One decryption session over one backup: open the container, unlock the
//! keybag, then write a plaintext copy of the backup with the same layout.

use crate::application::dto::{DecryptionSummary, FileFailure};
use crate::domain::entities::{Keybag, KeybagError, ManifestEntry, UnlockFailure, UnlockState};
use crate::infrastructure::backup::{read_manifest, BackupContainer, ContainerError, ManifestDbError, MANIFEST_DB};
use crate::infrastructure::crypto::cbc::{decrypt_cbc, strip_pkcs7_lenient};
use crate::infrastructure::crypto::{
    decrypt_entry, split_wrapped_key, unlock_with_key_file, unlock_with_password, unwrap_file_key,
    FileDecryptError,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Progress callback: `(processed, total)` manifest entries
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Where a decryption session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Locked,
    Unlocked,
    Failed,
    Decrypting,
    Done,
}

/// Errors that end a decryption session
#[derive(Error, Debug)]
pub enum BackupError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("Corrupt keybag: {0}")]
    CorruptKeybag(#[from] KeybagError),

    #[error("Failed to decrypt backup: {0}")]
    Unlock(UnlockFailure),

    #[error("Backup at {0} is not encrypted")]
    NotEncrypted(PathBuf),

    #[error("Cannot decrypt Manifest.db: {0}")]
    Manifest(String),

    #[error("Cannot read manifest database: {0}")]
    ManifestDb(#[from] ManifestDbError),

    #[error("Cannot write {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: SessionPhase,
        actual: SessionPhase,
    },
}

/// Decryption session over one encrypted backup
pub struct BackupDecryptionEngine {
    container: BackupContainer,
    keybag: Keybag,
    state: UnlockState,
    phase: SessionPhase,
}

impl BackupDecryptionEngine {
    /// Opens the backup and parses its keybag. Nothing is written.
    pub fn open(backup_path: &Path) -> Result<Self, BackupError> {
        let container = BackupContainer::open(backup_path)?;
        if !container.is_encrypted() {
            return Err(BackupError::NotEncrypted(backup_path.to_path_buf()));
        }

        let keybag = Keybag::parse(container.keybag_bytes())?;
        debug!(
            "Parsed keybag {} with {} class keys",
            keybag.uuid_hex(),
            keybag.class_keys.len()
        );

        Ok(Self {
            container,
            keybag,
            state: UnlockState::Locked,
            phase: SessionPhase::Locked,
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &UnlockState {
        &self.state
    }

    pub fn keybag(&self) -> &Keybag {
        &self.keybag
    }

    pub fn unlock_with_password(&mut self, password: &str) -> Result<(), BackupError> {
        self.expect_phase(SessionPhase::Locked)?;
        info!("Unlocking backup keybag with password");
        let state = unlock_with_password(&self.keybag, password.as_bytes());
        self.finish_unlock(state)
    }

    /// Unlocks with raw key material previously written by [`Self::write_key`]
    pub fn unlock_with_key(&mut self, raw_key: &[u8]) -> Result<(), BackupError> {
        self.expect_phase(SessionPhase::Locked)?;
        let state = unlock_with_key_file(&self.keybag, raw_key);
        self.finish_unlock(state)
    }

    pub fn unlock_with_key_file(&mut self, key_file: &Path) -> Result<(), BackupError> {
        info!("Unlocking backup keybag with key file {}", key_file.display());
        let raw_key = fs::read(key_file).map_err(|source| BackupError::Io {
            path: key_file.to_path_buf(),
            source,
        })?;
        self.unlock_with_key(&raw_key)
    }

    fn finish_unlock(&mut self, state: UnlockState) -> Result<(), BackupError> {
        self.state = state;
        match self.state.failure() {
            Some(reason) => {
                self.phase = SessionPhase::Failed;
                error!("Failed to unlock backup keybag: {}", reason);
                Err(BackupError::Unlock(reason))
            }
            None => {
                self.phase = SessionPhase::Unlocked;
                info!("Backup keybag unlocked");
                Ok(())
            }
        }
    }

    fn expect_phase(&self, expected: SessionPhase) -> Result<(), BackupError> {
        if self.phase != expected {
            return Err(BackupError::InvalidState {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn expect_unlocked(&self) -> Result<(), BackupError> {
        match self.phase {
            SessionPhase::Unlocked | SessionPhase::Decrypting | SessionPhase::Done => Ok(()),
            actual => Err(BackupError::InvalidState {
                expected: SessionPhase::Unlocked,
                actual,
            }),
        }
    }

    /// Hex encoding of the unlocked secret
    pub fn extract_key(&self) -> Result<String, BackupError> {
        self.expect_unlocked()?;
        self.state
            .secret()
            .map(|secret| secret.to_hex())
            .ok_or(BackupError::InvalidState {
                expected: SessionPhase::Unlocked,
                actual: self.phase,
            })
    }

    /// Writes the raw 32-byte secret, usable with `unlock_with_key_file`
    pub fn write_key(&self, path: &Path) -> Result<(), BackupError> {
        self.expect_unlocked()?;
        let secret = self.state.secret().ok_or(BackupError::InvalidState {
            expected: SessionPhase::Unlocked,
            actual: self.phase,
        })?;
        fs::write(path, secret.as_bytes()).map_err(|source| BackupError::OutputWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Wrote decryption key to file {}", path.display());
        Ok(())
    }

    /// Decrypts `Manifest.db` and every file it lists into `destination`.
    ///
    /// Files that fail to decrypt are recorded in the summary and skipped.
    pub fn process_backup(
        &mut self,
        destination: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<DecryptionSummary, BackupError> {
        self.expect_phase(SessionPhase::Unlocked)?;
        self.phase = SessionPhase::Decrypting;
        let start = Instant::now();

        info!("Decrypting backup and saving it to {}", destination.display());
        create_dir(destination)?;

        let manifest_path = destination.join(MANIFEST_DB);
        let manifest = self.decrypt_manifest_db()?;
        write_file(&manifest_path, &manifest)?;

        let entries: Vec<ManifestEntry> = read_manifest(&manifest_path)?
            .into_iter()
            .map(|file| file.entry)
            .collect();
        let total = entries.len();
        info!("Manifest lists {} entries", total);

        let mut summary = DecryptionSummary::new(destination.to_path_buf());

        for (index, entry) in entries.iter().enumerate() {
            if let Some(ref callback) = progress {
                callback(index + 1, total);
            }
            if !entry.is_file() {
                continue;
            }
            if !entry.has_valid_file_id() {
                warn!(
                    file_id = %entry.file_id,
                    "Skipping {}-{}: invalid file identifier",
                    entry.domain,
                    entry.relative_path
                );
                summary.add_failure(FileFailure {
                    file_id: entry.file_id.clone(),
                    domain: entry.domain.clone(),
                    relative_path: entry.relative_path.clone(),
                    error: "invalid file identifier".to_string(),
                });
                continue;
            }

            let source = entry.storage_path(self.container.root());
            if !source.is_file() {
                debug!("{} ({}) is not in the backup", entry.relative_path, entry.file_id);
                summary.missing += 1;
                continue;
            }

            let decrypted = fs::read(&source)
                .map_err(|e| e.to_string())
                .and_then(|ciphertext| {
                    decrypt_entry(entry, &self.state, &ciphertext).map_err(|e| e.to_string())
                });

            match decrypted {
                Ok(plaintext) => {
                    write_file(&entry.storage_path(destination), &plaintext)?;
                    summary.decrypted += 1;
                }
                Err(error) => {
                    warn!(
                        file_id = %entry.file_id,
                        "Cannot decrypt {}-{}: {}",
                        entry.domain,
                        entry.relative_path,
                        error
                    );
                    summary.add_failure(FileFailure {
                        file_id: entry.file_id.clone(),
                        domain: entry.domain.clone(),
                        relative_path: entry.relative_path.clone(),
                        error,
                    });
                }
            }
        }

        for plist in self.container.root_plists()? {
            let Some(name) = plist.file_name() else {
                continue;
            };
            let target = destination.join(name);
            fs::copy(&plist, &target).map_err(|source| BackupError::OutputWrite {
                path: target.clone(),
                source,
            })?;
            summary.plists_copied += 1;
        }

        summary.duration = start.elapsed();
        self.phase = SessionPhase::Done;
        info!("{}", summary.summary());
        Ok(summary)
    }

    fn decrypt_manifest_db(&self) -> Result<Vec<u8>, BackupError> {
        let data = self.container.read_manifest_db()?;

        let Some(blob) = self.container.manifest_key() else {
            warn!("Backup has no ManifestKey, copying Manifest.db as is");
            return Ok(data);
        };

        let manifest_err = |e: FileDecryptError| BackupError::Manifest(e.to_string());
        let (class, wrapped) = split_wrapped_key(blob).map_err(manifest_err)?;
        let key = unwrap_file_key(&self.state, class, wrapped).map_err(manifest_err)?;
        let mut plaintext = decrypt_cbc(&key, &data)
            .map_err(|e| BackupError::Manifest(e.to_string()))?;
        strip_pkcs7_lenient(&mut plaintext);
        Ok(plaintext)
    }
}

fn create_dir(path: &Path) -> Result<(), BackupError> {
    fs::create_dir_all(path).map_err(|source| BackupError::OutputWrite {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), BackupError> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, data).map_err(|source| BackupError::OutputWrite {
        path: path.to_path_buf(),
        source,
    })
}
