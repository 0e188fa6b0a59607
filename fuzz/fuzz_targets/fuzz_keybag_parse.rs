#![no_main]

use ios_triage::domain::entities::Keybag;
use ios_triage::infrastructure::crypto::unlock_with_key_file;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(keybag) = Keybag::parse(data) {
        let _ = unlock_with_key_file(&keybag, &[0u8; 32]);
    }
});
