//! AES key wrap (RFC 3394)
//!
//! Class keys, per-file keys and the manifest key are all stored wrapped
//! this way. Only 256-bit key-encryption keys are used.

use crate::domain::entities::SymmetricKey;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes256, Block};
use thiserror::Error;
use zeroize::Zeroizing;

/// Default initial value
pub const DEFAULT_IV: [u8; 8] = [0xA6; 8];

const SEMIBLOCK: usize = 8;
const ROUNDS: u64 = 6;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWrapError {
    /// Input is not a whole number of 64-bit blocks or is too short
    #[error("invalid wrapped key length: {0}")]
    InvalidLength(usize),

    /// The recovered integrity value does not match; wrong key or corrupt data
    #[error("key unwrap integrity check failed")]
    IntegrityCheck,
}

/// Wraps `key` (at least 128 bits, in 64-bit steps) under `kek`.
pub fn wrap(kek: &SymmetricKey, key: &[u8]) -> Result<Vec<u8>, KeyWrapError> {
    if key.len() < 2 * SEMIBLOCK || key.len() % SEMIBLOCK != 0 {
        return Err(KeyWrapError::InvalidLength(key.len()));
    }

    let cipher = Aes256::new(kek.as_bytes().into());
    let n = key.len() / SEMIBLOCK;
    let mut a = DEFAULT_IV;
    let mut r = Zeroizing::new(key.to_vec());

    for j in 0..ROUNDS {
        for i in 0..n {
            let mut block = Block::default();
            block[..SEMIBLOCK].copy_from_slice(&a);
            block[SEMIBLOCK..].copy_from_slice(&r[i * SEMIBLOCK..(i + 1) * SEMIBLOCK]);
            cipher.encrypt_block(&mut block);

            let t = n as u64 * j + (i as u64 + 1);
            a.copy_from_slice(&block[..SEMIBLOCK]);
            xor_counter(&mut a, t);
            r[i * SEMIBLOCK..(i + 1) * SEMIBLOCK].copy_from_slice(&block[SEMIBLOCK..]);
        }
    }

    let mut out = Vec::with_capacity(key.len() + SEMIBLOCK);
    out.extend_from_slice(&a);
    out.extend_from_slice(&r);
    Ok(out)
}

/// Unwraps `wrapped` under `kek`, verifying the integrity value.
///
/// Nothing of the recovered key is returned when verification fails.
pub fn unwrap(kek: &SymmetricKey, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyWrapError> {
    if wrapped.len() < 3 * SEMIBLOCK || wrapped.len() % SEMIBLOCK != 0 {
        return Err(KeyWrapError::InvalidLength(wrapped.len()));
    }

    let cipher = Aes256::new(kek.as_bytes().into());
    let n = wrapped.len() / SEMIBLOCK - 1;
    let mut a = [0u8; SEMIBLOCK];
    a.copy_from_slice(&wrapped[..SEMIBLOCK]);
    let mut r = Zeroizing::new(wrapped[SEMIBLOCK..].to_vec());

    for j in (0..ROUNDS).rev() {
        for i in (0..n).rev() {
            let t = n as u64 * j + (i as u64 + 1);
            xor_counter(&mut a, t);

            let mut block = Block::default();
            block[..SEMIBLOCK].copy_from_slice(&a);
            block[SEMIBLOCK..].copy_from_slice(&r[i * SEMIBLOCK..(i + 1) * SEMIBLOCK]);
            cipher.decrypt_block(&mut block);

            a.copy_from_slice(&block[..SEMIBLOCK]);
            r[i * SEMIBLOCK..(i + 1) * SEMIBLOCK].copy_from_slice(&block[SEMIBLOCK..]);
        }
    }

    if a != DEFAULT_IV {
        return Err(KeyWrapError::IntegrityCheck);
    }

    Ok(r)
}

fn xor_counter(a: &mut [u8; SEMIBLOCK], t: u64) {
    for (byte, counter) in a.iter_mut().zip(t.to_be_bytes()) {
        *byte ^= counter;
    }
}
