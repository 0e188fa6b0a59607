//! Backup cryptography
//!
//! Key derivation, RFC 3394 key unwrapping, AES-CBC and the per-file
//! decryptor built from them.

pub mod cbc;
pub mod file_decryptor;
pub mod kdf;
pub mod key_wrap;
pub mod unlock;

pub use file_decryptor::{decrypt_entry, split_wrapped_key, unwrap_file_key, FileDecryptError};
pub use unlock::{unlock_with_password, unlock_with_key_file};
