//! Backup keybag
//!
//! The keybag is a flat sequence of `TAG | LENGTH | VALUE` records. Header
//! records describe the keybag itself and its key-derivation parameters;
//! every `UUID` record after the first one opens a new class-key record.

use std::collections::BTreeMap;
use thiserror::Error;

/// Wrap flag set on class keys protected by the backup password.
pub const WRAP_PASSCODE: u32 = 2;

/// Wrap flag set on class keys protected by the device UID.
pub const WRAP_DEVICE: u32 = 1;

const TAG_LEN: usize = 4;
const HEADER_LEN: usize = 8;
const CLASS_ID_MASK: u32 = 0xF;
const KEYBAG_TYPE_MASK: u32 = 0x3FFF_FFFF;

/// Errors raised while decoding a keybag.
///
/// Any of these makes the whole backup unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeybagError {
    #[error("Keybag truncated at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Invalid tag {tag:02x?} at offset {offset}")]
    InvalidTag { offset: usize, tag: [u8; 4] },

    #[error("Tag {tag} holds {len} bytes, expected a 4-byte integer")]
    InvalidInteger { tag: String, len: usize },

    #[error("Mandatory tag {0} is missing")]
    MissingTag(&'static str),

    #[error("Class key record without CLAS tag")]
    MissingClass,
}

/// Identifier of a data protection class (`CLAS & 0xF`).
pub type ProtectionClass = u32;

/// A class key as stored in the keybag, still wrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedClassKey {
    pub uuid: Vec<u8>,
    pub class: ProtectionClass,
    pub wrap: u32,
    pub key_type: Option<u32>,
    pub wrapped_key: Option<Vec<u8>>,
    pub public_key: Option<Vec<u8>>,
}

impl WrappedClassKey {
    /// Returns true if this key is wrapped with the password-derived secret
    pub fn is_passcode_wrapped(&self) -> bool {
        self.wrap & WRAP_PASSCODE != 0
    }
}

/// Parsed keybag. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keybag {
    pub version: u32,
    pub keybag_type: Option<u32>,
    pub uuid: Vec<u8>,
    pub wrap: Option<u32>,
    pub salt: Vec<u8>,
    pub iterations: u32,
    pub double_protection_salt: Option<Vec<u8>>,
    pub double_protection_iterations: Option<u32>,
    pub hmac_key: Option<Vec<u8>>,
    pub class_keys: BTreeMap<ProtectionClass, WrappedClassKey>,
    pub attributes: BTreeMap<String, Vec<u8>>,
}

/// A single raw TLV record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvRecord<'a> {
    pub tag: [u8; 4],
    pub offset: usize,
    pub value: &'a [u8],
}

impl TlvRecord<'_> {
    /// Tag rendered as text (tags are always ASCII)
    pub fn tag_str(&self) -> &str {
        std::str::from_utf8(&self.tag).unwrap_or("????")
    }

    fn as_u32(&self) -> Result<u32, KeybagError> {
        let bytes: [u8; 4] = self.value.try_into().map_err(|_| KeybagError::InvalidInteger {
            tag: self.tag_str().to_string(),
            len: self.value.len(),
        })?;
        Ok(u32::from_be_bytes(bytes))
    }
}

/// Iterator over the TLV records of a keybag blob.
pub struct TlvReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> TlvReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }
}

impl<'a> Iterator for TlvReader<'a> {
    type Item = Result<TlvRecord<'a>, KeybagError>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.data.len() - self.offset;
        if remaining == 0 {
            return None;
        }

        let offset = self.offset;
        if remaining < HEADER_LEN {
            self.offset = self.data.len();
            return Some(Err(KeybagError::Truncated {
                offset,
                needed: HEADER_LEN,
                available: remaining,
            }));
        }

        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&self.data[offset..offset + TAG_LEN]);
        if !tag.iter().all(u8::is_ascii_alphanumeric) {
            self.offset = self.data.len();
            return Some(Err(KeybagError::InvalidTag { offset, tag }));
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&self.data[offset + TAG_LEN..offset + HEADER_LEN]);
        let len = u32::from_be_bytes(len_bytes) as usize;

        let start = offset + HEADER_LEN;
        let available = self.data.len() - start;
        if len > available {
            self.offset = self.data.len();
            return Some(Err(KeybagError::Truncated {
                offset,
                needed: len,
                available,
            }));
        }

        self.offset = start + len;
        Some(Ok(TlvRecord {
            tag,
            offset,
            value: &self.data[start..start + len],
        }))
    }
}

#[derive(Default)]
struct ClassKeyBuilder {
    uuid: Vec<u8>,
    class: Option<u32>,
    wrap: u32,
    key_type: Option<u32>,
    wrapped_key: Option<Vec<u8>>,
    public_key: Option<Vec<u8>>,
}

impl ClassKeyBuilder {
    fn build(self) -> Result<WrappedClassKey, KeybagError> {
        let class = self.class.ok_or(KeybagError::MissingClass)?;
        Ok(WrappedClassKey {
            uuid: self.uuid,
            class: class & CLASS_ID_MASK,
            wrap: self.wrap,
            key_type: self.key_type,
            wrapped_key: self.wrapped_key,
            public_key: self.public_key,
        })
    }
}

impl Keybag {
    /// Decodes a keybag blob.
    ///
    /// Unknown header tags are preserved in [`Keybag::attributes`]; unknown
    /// tags inside a class-key record are ignored.
    pub fn parse(data: &[u8]) -> Result<Self, KeybagError> {
        let mut version = None;
        let mut keybag_type = None;
        let mut uuid: Option<Vec<u8>> = None;
        let mut wrap = None;
        let mut salt = None;
        let mut iterations = None;
        let mut dp_salt = None;
        let mut dp_iterations = None;
        let mut hmac_key = None;
        let mut attributes = BTreeMap::new();
        let mut class_keys = BTreeMap::new();
        let mut current: Option<ClassKeyBuilder> = None;

        for record in TlvReader::new(data) {
            let record = record?;

            if &record.tag == b"UUID" {
                if uuid.is_none() {
                    uuid = Some(record.value.to_vec());
                    continue;
                }
                if let Some(done) = current.take() {
                    let key = done.build()?;
                    class_keys.insert(key.class, key);
                }
                current = Some(ClassKeyBuilder {
                    uuid: record.value.to_vec(),
                    ..Default::default()
                });
                continue;
            }

            match (&record.tag, current.as_mut()) {
                (b"CLAS", Some(key)) => key.class = Some(record.as_u32()?),
                (b"WRAP", Some(key)) => key.wrap = record.as_u32()?,
                (b"KTYP", Some(key)) => key.key_type = Some(record.as_u32()?),
                (b"WPKY", Some(key)) => key.wrapped_key = Some(record.value.to_vec()),
                (b"PBKY", Some(key)) => key.public_key = Some(record.value.to_vec()),
                (_, Some(_)) => {}
                (b"VERS", None) => version = Some(record.as_u32()?),
                (b"TYPE", None) => keybag_type = Some(record.as_u32()? & KEYBAG_TYPE_MASK),
                (b"WRAP", None) => wrap = Some(record.as_u32()?),
                (b"SALT", None) => salt = Some(record.value.to_vec()),
                (b"ITER", None) => iterations = Some(record.as_u32()?),
                (b"DPSL", None) => dp_salt = Some(record.value.to_vec()),
                (b"DPIC", None) => dp_iterations = Some(record.as_u32()?),
                (b"HMCK", None) => hmac_key = Some(record.value.to_vec()),
                (_, None) => {
                    attributes.insert(record.tag_str().to_string(), record.value.to_vec());
                }
            }
        }

        if let Some(done) = current.take() {
            let key = done.build()?;
            class_keys.insert(key.class, key);
        }

        Ok(Self {
            version: version.ok_or(KeybagError::MissingTag("VERS"))?,
            keybag_type,
            uuid: uuid.ok_or(KeybagError::MissingTag("UUID"))?,
            wrap,
            salt: salt.ok_or(KeybagError::MissingTag("SALT"))?,
            iterations: iterations.ok_or(KeybagError::MissingTag("ITER"))?,
            double_protection_salt: dp_salt,
            double_protection_iterations: dp_iterations,
            hmac_key,
            class_keys,
            attributes,
        })
    }

    /// Returns the wrapped key for a protection class
    pub fn class_key(&self, class: ProtectionClass) -> Option<&WrappedClassKey> {
        self.class_keys.get(&class)
    }

    /// Hex rendering of the keybag UUID
    pub fn uuid_hex(&self) -> String {
        hex::encode(&self.uuid)
    }
}

/// Appends one TLV record to `out`.
///
/// Used to serialize keybags (fixtures, fuzz corpora) in the same layout the
/// parser reads.
pub fn encode_tlv(out: &mut Vec<u8>, tag: &[u8; 4], value: &[u8]) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(value);
}

/// Appends a 4-byte big-endian integer record to `out`.
pub fn encode_tlv_u32(out: &mut Vec<u8>, tag: &[u8; 4], value: u32) {
    encode_tlv(out, tag, &value.to_be_bytes());
}
