//! Keybag unlock
//!
//! Turns a password or a previously exported key into an [`UnlockState`].
//! The secret is checked through the integrity value of every
//! passcode-wrapped class key; a single mismatch fails the whole attempt.

use crate::domain::entities::{
    ClassKeyTable, Keybag, SymmetricKey, UnlockFailure, UnlockState, KEY_LEN,
};
use crate::infrastructure::crypto::kdf::derive_secret;
use crate::infrastructure::crypto::key_wrap::{self, KeyWrapError};
use tracing::{debug, warn};

/// Derives the secret from `password` and unwraps the class keys.
pub fn unlock_with_password(keybag: &Keybag, password: &[u8]) -> UnlockState {
    match derive_secret(keybag, password) {
        Ok(secret) => unwrap_class_keys(keybag, secret, UnlockFailure::WrongPassword),
        Err(reason) => UnlockState::Failed { reason },
    }
}

/// Unwraps the class keys with raw key material from a key file.
pub fn unlock_with_key_file(keybag: &Keybag, raw_key: &[u8]) -> UnlockState {
    match SymmetricKey::from_slice(raw_key) {
        Some(secret) => unwrap_class_keys(keybag, secret, UnlockFailure::WrongKey),
        None => UnlockState::Failed {
            reason: UnlockFailure::InvalidKeyMaterial(raw_key.len()),
        },
    }
}

fn unwrap_class_keys(keybag: &Keybag, secret: SymmetricKey, on_mismatch: UnlockFailure) -> UnlockState {
    let mut table = ClassKeyTable::new();
    let mut verified = 0usize;

    for class_key in keybag.class_keys.values() {
        if !class_key.is_passcode_wrapped() {
            debug!(class = class_key.class, "Skipping class key not wrapped by passcode");
            continue;
        }
        let Some(wrapped) = class_key.wrapped_key.as_deref() else {
            debug!(class = class_key.class, "Class key has no wrapped key");
            continue;
        };

        match key_wrap::unwrap(&secret, wrapped) {
            Ok(raw) => {
                verified += 1;
                match SymmetricKey::from_slice(&raw) {
                    Some(key) => table.insert(class_key.class, key),
                    None => warn!(
                        class = class_key.class,
                        "Unwrapped class key is {} bytes, expected {}",
                        raw.len(),
                        KEY_LEN
                    ),
                }
            }
            Err(KeyWrapError::IntegrityCheck) => {
                return UnlockState::Failed {
                    reason: on_mismatch,
                };
            }
            Err(KeyWrapError::InvalidLength(len)) => {
                warn!(class = class_key.class, "Wrapped class key has invalid length {}", len);
            }
        }
    }

    if verified == 0 {
        return UnlockState::Failed {
            reason: on_mismatch,
        };
    }

    debug!("Unlocked {} class keys", table.len());
    UnlockState::Unlocked {
        secret,
        class_keys: table,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{WrappedClassKey, WRAP_DEVICE, WRAP_PASSCODE};
    use std::collections::BTreeMap;

    fn keybag_for(password: &[u8]) -> Keybag {
        let mut keybag = Keybag {
            version: 3,
            keybag_type: Some(1),
            uuid: vec![1; 16],
            wrap: Some(0),
            salt: b"0123456789abcdef0123".to_vec(),
            iterations: 10,
            double_protection_salt: None,
            double_protection_iterations: None,
            hmac_key: None,
            class_keys: BTreeMap::new(),
            attributes: BTreeMap::new(),
        };
        let secret = derive_secret(&keybag, password).unwrap();

        for class in [1u32, 3] {
            let raw = [class as u8; KEY_LEN];
            keybag.class_keys.insert(
                class,
                WrappedClassKey {
                    uuid: vec![class as u8; 16],
                    class,
                    wrap: WRAP_PASSCODE | WRAP_DEVICE,
                    key_type: Some(0),
                    wrapped_key: Some(key_wrap::wrap(&secret, &raw).unwrap()),
                    public_key: None,
                },
            );
        }
        keybag.class_keys.insert(
            5,
            WrappedClassKey {
                uuid: vec![5; 16],
                class: 5,
                wrap: WRAP_DEVICE,
                key_type: Some(0),
                wrapped_key: Some(vec![0xEE; 40]),
                public_key: None,
            },
        );
        keybag
    }

    #[test]
    fn test_correct_password_unlocks_passcode_classes() {
        let keybag = keybag_for(b"hunter2");
        let state = unlock_with_password(&keybag, b"hunter2");
        assert!(state.is_unlocked());
        assert_eq!(state.class_key(3).unwrap().as_bytes(), &[3; KEY_LEN]);
        assert!(state.class_key(5).is_err());
    }

    #[test]
    fn test_wrong_password_exposes_no_keys() {
        let keybag = keybag_for(b"hunter2");
        let state = unlock_with_password(&keybag, b"hunter3");
        assert_eq!(state.failure(), Some(UnlockFailure::WrongPassword));
        assert!(state.class_key(1).is_err());
        assert!(state.secret().is_none());
    }

    #[test]
    fn test_key_file_round_trip() {
        let keybag = keybag_for(b"hunter2");
        let unlocked = unlock_with_password(&keybag, b"hunter2");
        let raw = unlocked.secret().unwrap().as_bytes().to_vec();

        let reused = unlock_with_key_file(&keybag, &raw);
        assert_eq!(reused.class_key(1).unwrap(), unlocked.class_key(1).unwrap());
    }

    #[test]
    fn test_key_file_errors() {
        let keybag = keybag_for(b"hunter2");
        assert_eq!(
            unlock_with_key_file(&keybag, &[0; 16]).failure(),
            Some(UnlockFailure::InvalidKeyMaterial(16))
        );
        assert_eq!(
            unlock_with_key_file(&keybag, &[0; KEY_LEN]).failure(),
            Some(UnlockFailure::WrongKey)
        );
    }
}
