//! Application layer
//!
//! Use cases that orchestrate the domain and infrastructure: decrypting a
//! backup, running modules over a source, re-checking stored results.

mod check_iocs;
mod decrypt_backup;
pub mod dto;
mod run_modules;

pub use check_iocs::check_stored_results;
pub use decrypt_backup::{BackupDecryptionEngine, BackupError, ProgressCallback, SessionPhase};
pub use run_modules::{ExecutionDriver, TIMELINE_DETECTED_FILE, TIMELINE_FILE};
