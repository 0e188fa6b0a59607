//! Per-file decryption
//!
//! Every encrypted blob in a backup (file contents and the manifest
//! database) carries its own key, stored as a 4-byte little-endian
//! protection class followed by that key wrapped with the class key.

use crate::domain::entities::{
    ClassKeyError, ManifestEntry, ProtectionClass, SymmetricKey, UnlockState,
};
use crate::infrastructure::crypto::cbc::{decrypt_cbc, strip_pkcs7, CbcError};
use crate::infrastructure::crypto::key_wrap::{self, KeyWrapError};
use thiserror::Error;

const CLASS_PREFIX_LEN: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileDecryptError {
    #[error("class key unavailable: {0}")]
    ClassKeyUnavailable(#[from] ClassKeyError),

    #[error("entry has no wrapped key")]
    MissingKey,

    #[error("wrapped key blob is too short ({0} bytes)")]
    MalformedKey(usize),

    #[error("cannot unwrap file key: {0}")]
    Unwrap(#[from] KeyWrapError),

    #[error("unwrapped file key is {0} bytes, expected 32")]
    KeyLength(usize),

    #[error("decryption failed: {0}")]
    Cipher(#[from] CbcError),
}

/// Splits a class-prefixed wrapped key into its class and wrapped bytes.
pub fn split_wrapped_key(blob: &[u8]) -> Result<(ProtectionClass, &[u8]), FileDecryptError> {
    if blob.len() <= CLASS_PREFIX_LEN {
        return Err(FileDecryptError::MalformedKey(blob.len()));
    }
    let (prefix, wrapped) = blob.split_at(CLASS_PREFIX_LEN);
    let mut class = [0u8; CLASS_PREFIX_LEN];
    class.copy_from_slice(prefix);
    Ok((u32::from_le_bytes(class), wrapped))
}

/// Unwraps a wrapped key with the class key of `class`.
pub fn unwrap_file_key(
    state: &UnlockState,
    class: ProtectionClass,
    wrapped: &[u8],
) -> Result<SymmetricKey, FileDecryptError> {
    let class_key = state.class_key(class)?;
    let raw = key_wrap::unwrap(class_key, wrapped)?;
    SymmetricKey::from_slice(&raw).ok_or(FileDecryptError::KeyLength(raw.len()))
}

/// Recovers the plaintext of one manifest entry.
///
/// The class recorded on the entry selects the class key; when the entry
/// has none, the class in the key prefix is used. The plaintext is cut to
/// the recorded size when that is shorter.
pub fn decrypt_entry(
    entry: &ManifestEntry,
    state: &UnlockState,
    ciphertext: &[u8],
) -> Result<Vec<u8>, FileDecryptError> {
    let blob = entry
        .encryption_key
        .as_deref()
        .ok_or(FileDecryptError::MissingKey)?;
    let (prefix_class, wrapped) = split_wrapped_key(blob)?;
    let class = entry.protection_class.unwrap_or(prefix_class);

    let key = unwrap_file_key(state, class, wrapped)?;
    let mut plaintext = decrypt_cbc(&key, ciphertext)?;
    strip_pkcs7(&mut plaintext)?;

    if let Some(size) = entry.size {
        if (size as usize) < plaintext.len() {
            plaintext.truncate(size as usize);
        }
    }

    Ok(plaintext)
}
