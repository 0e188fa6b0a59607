//! Domain entities
//!
//! Core objects of the triage domain: the backup keybag and its unlock
//! state, manifest entries, and timeline events.

mod keybag;
mod manifest;
mod timeline;
mod unlock_state;

pub use keybag::{
    encode_tlv, encode_tlv_u32, Keybag, KeybagError, ProtectionClass, TlvReader, TlvRecord,
    WrappedClassKey, WRAP_DEVICE, WRAP_PASSCODE,
};
pub use manifest::{file_id, is_valid_file_id, storage_path, EntryKind, ManifestEntry};
pub use timeline::{TimelineEvent, TIMESTAMP_FORMAT};
pub use unlock_state::{
    ClassKeyError, ClassKeyTable, SymmetricKey, UnlockFailure, UnlockState, KEY_LEN,
};
