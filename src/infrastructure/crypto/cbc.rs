//! AES-256-CBC with a zero IV
//!
//! Backup file contents and `Manifest.db` are encrypted this way. Chaining
//! is done by hand over the block cipher.

use crate::domain::entities::SymmetricKey;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes256, Block};
use thiserror::Error;

pub const BLOCK_LEN: usize = 16;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CbcError {
    #[error("ciphertext length {0} is not a multiple of the block size")]
    Length(usize),

    #[error("invalid PKCS#7 padding")]
    Padding,
}

/// Decrypts whole blocks, leaving any padding in place.
pub fn decrypt_cbc(key: &SymmetricKey, ciphertext: &[u8]) -> Result<Vec<u8>, CbcError> {
    if ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CbcError::Length(ciphertext.len()));
    }

    let cipher = Aes256::new(key.as_bytes().into());
    let mut previous = [0u8; BLOCK_LEN];
    let mut plaintext = Vec::with_capacity(ciphertext.len());

    for chunk in ciphertext.chunks_exact(BLOCK_LEN) {
        let mut block = *Block::from_slice(chunk);
        cipher.decrypt_block(&mut block);
        xor_block(&mut block, &previous);
        plaintext.extend_from_slice(&block);
        previous.copy_from_slice(chunk);
    }

    Ok(plaintext)
}

/// Pads and encrypts `plaintext`.
pub fn encrypt_cbc(key: &SymmetricKey, plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes256::new(key.as_bytes().into());
    let padded = pad_pkcs7(plaintext);
    let mut previous = [0u8; BLOCK_LEN];
    let mut ciphertext = Vec::with_capacity(padded.len());

    for chunk in padded.chunks_exact(BLOCK_LEN) {
        let mut block = *Block::from_slice(chunk);
        xor_block(&mut block, &previous);
        cipher.encrypt_block(&mut block);
        ciphertext.extend_from_slice(&block);
        previous.copy_from_slice(&block);
    }

    ciphertext
}

pub fn pad_pkcs7(data: &[u8]) -> Vec<u8> {
    let pad = BLOCK_LEN - data.len() % BLOCK_LEN;
    let mut out = Vec::with_capacity(data.len() + pad);
    out.extend_from_slice(data);
    out.resize(data.len() + pad, pad as u8);
    out
}

/// Removes PKCS#7 padding in place, checking every pad byte.
pub fn strip_pkcs7(data: &mut Vec<u8>) -> Result<(), CbcError> {
    let pad = *data.last().ok_or(CbcError::Padding)? as usize;
    if pad == 0 || pad > BLOCK_LEN || pad > data.len() {
        return Err(CbcError::Padding);
    }
    if data[data.len() - pad..].iter().any(|&b| b as usize != pad) {
        return Err(CbcError::Padding);
    }
    data.truncate(data.len() - pad);
    Ok(())
}

/// Removes trailing padding when it looks valid, otherwise leaves the data
/// untouched.
pub fn strip_pkcs7_lenient(data: &mut Vec<u8>) {
    let _ = strip_pkcs7(data);
}

fn xor_block(block: &mut Block, other: &[u8; BLOCK_LEN]) {
    for (b, o) in block.iter_mut().zip(other) {
        *b ^= o;
    }
}
