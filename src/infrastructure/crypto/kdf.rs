//! Backup password derivation
//!
//! Newer backups run the password through PBKDF2-HMAC-SHA256 with the
//! keybag's `DPSL`/`DPIC` first, then through PBKDF2-HMAC-SHA1 with
//! `SALT`/`ITER`. Older keybags carry only the second stage.

use crate::domain::entities::{Keybag, SymmetricKey, UnlockFailure, KEY_LEN};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha1::Sha1;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Derives the keybag unlocking secret from a password.
pub fn derive_secret(keybag: &Keybag, password: &[u8]) -> Result<SymmetricKey, UnlockFailure> {
    let stage_one = match (
        keybag.double_protection_salt.as_deref(),
        keybag.double_protection_iterations,
    ) {
        (Some(salt), Some(iterations)) => {
            let mut out = Zeroizing::new([0u8; KEY_LEN]);
            check_iterations(iterations)?;
            pbkdf2::<Hmac<Sha256>>(password, salt, iterations, &mut out[..])
                .map_err(|_| UnlockFailure::Derivation)?;
            Some(out)
        }
        _ => None,
    };

    let input: &[u8] = match &stage_one {
        Some(key) => &key[..],
        None => password,
    };

    let mut secret = Zeroizing::new([0u8; KEY_LEN]);
    check_iterations(keybag.iterations)?;
    pbkdf2::<Hmac<Sha1>>(input, &keybag.salt, keybag.iterations, &mut secret[..])
        .map_err(|_| UnlockFailure::Derivation)?;
    Ok(SymmetricKey::new(*secret))
}

fn check_iterations(iterations: u32) -> Result<(), UnlockFailure> {
    if iterations == 0 {
        return Err(UnlockFailure::Derivation);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn keybag(dpsl: Option<Vec<u8>>, dpic: Option<u32>) -> Keybag {
        Keybag {
            version: 4,
            keybag_type: Some(1),
            uuid: vec![0; 16],
            wrap: None,
            salt: b"salt".to_vec(),
            iterations: 1,
            double_protection_salt: dpsl,
            double_protection_iterations: dpic,
            hmac_key: None,
            class_keys: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_single_stage_matches_pbkdf2_sha1() {
        // RFC 6070 test vector 1
        let secret = derive_secret(&keybag(None, None), b"password").unwrap();
        assert_eq!(
            &secret.to_hex()[..40],
            "0c60c80f961f0e71f3a9b524af6012062fe037a6"
        );
    }

    #[test]
    fn test_double_protection_changes_secret() {
        let single = derive_secret(&keybag(None, None), b"password").unwrap();
        let double = derive_secret(&keybag(Some(b"dpsl".to_vec()), Some(1)), b"password").unwrap();
        assert_ne!(single, double);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut kb = keybag(None, None);
        kb.iterations = 0;
        assert_eq!(derive_secret(&kb, b"x").unwrap_err(), UnlockFailure::Derivation);
    }
}
