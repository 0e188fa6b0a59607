//! Data Transfer Objects

mod decryption_summary;
mod run_options;
mod run_summary;

pub use decryption_summary::{DecryptionSummary, FileFailure};
pub use run_options::RunOptions;
pub use run_summary::{ModuleReport, ModuleStatus, RunSummary};
