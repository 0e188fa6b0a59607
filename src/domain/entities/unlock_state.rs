//! Unlock state of a decryption session

use crate::domain::entities::ProtectionClass;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length in bytes of every symmetric key handled by the engine.
pub const KEY_LEN: usize = 32;

/// A raw AES-256 key. Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Builds a key from a slice, returning `None` unless it is exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Unwrapped class keys, by protection class.
#[derive(Debug, Clone, Default)]
pub struct ClassKeyTable {
    keys: BTreeMap<ProtectionClass, SymmetricKey>,
}

impl ClassKeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: ProtectionClass, key: SymmetricKey) {
        self.keys.insert(class, key);
    }

    pub fn get(&self, class: ProtectionClass) -> Option<&SymmetricKey> {
        self.keys.get(&class)
    }

    pub fn classes(&self) -> impl Iterator<Item = ProtectionClass> + '_ {
        self.keys.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Why an unlock attempt failed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockFailure {
    #[error("wrong backup password")]
    WrongPassword,

    #[error("key material does not unlock this keybag")]
    WrongKey,

    #[error("key material must be 32 bytes, got {0}")]
    InvalidKeyMaterial(usize),

    #[error("key derivation failed")]
    Derivation,
}

/// Errors returned by [`UnlockState::class_key`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKeyError {
    #[error("keybag is locked")]
    KeybagLocked,

    #[error("no unlocked key for protection class {0}")]
    UnknownClass(ProtectionClass),
}

/// State of one decryption session's keybag.
///
/// `Locked` moves to either `Unlocked` or `Failed` exactly once; neither
/// of those ever changes again.
#[derive(Debug, Clone, Default)]
pub enum UnlockState {
    #[default]
    Locked,
    Unlocked {
        secret: SymmetricKey,
        class_keys: ClassKeyTable,
    },
    Failed {
        reason: UnlockFailure,
    },
}

impl UnlockState {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, UnlockState::Unlocked { .. })
    }

    /// Returns the unwrapped key for a protection class
    pub fn class_key(&self, class: ProtectionClass) -> Result<&SymmetricKey, ClassKeyError> {
        match self {
            UnlockState::Unlocked { class_keys, .. } => class_keys
                .get(class)
                .ok_or(ClassKeyError::UnknownClass(class)),
            _ => Err(ClassKeyError::KeybagLocked),
        }
    }

    /// Returns the unlocking secret, which can be reused as a key file
    pub fn secret(&self) -> Option<&SymmetricKey> {
        match self {
            UnlockState::Unlocked { secret, .. } => Some(secret),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<UnlockFailure> {
        match self {
            UnlockState::Failed { reason } => Some(*reason),
            _ => None,
        }
    }
}
