#![no_main]

use ios_triage::infrastructure::modules::parse_session;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = parse_session(data);
});
