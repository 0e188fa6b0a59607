//! Decryption summary DTO

use std::path::PathBuf;
use std::time::Duration;

/// A file that could not be decrypted
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub file_id: String,
    pub domain: String,
    pub relative_path: String,
    pub error: String,
}

/// Result of decrypting a whole backup
#[derive(Debug, Clone)]
pub struct DecryptionSummary {
    pub destination: PathBuf,
    /// Files written to the destination
    pub decrypted: usize,
    /// Manifest entries whose file is absent from the backup
    pub missing: usize,
    /// Property lists copied from the backup root
    pub plists_copied: usize,
    pub failures: Vec<FileFailure>,
    pub duration: Duration,
}

impl DecryptionSummary {
    pub fn new(destination: PathBuf) -> Self {
        Self {
            destination,
            decrypted: 0,
            missing: 0,
            plists_copied: 0,
            failures: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn add_failure(&mut self, failure: FileFailure) {
        self.failures.push(failure);
    }

    pub fn summary(&self) -> String {
        format!(
            "Decrypted {} files to {} ({} missing, {} failed) in {:.2}s",
            self.decrypted,
            self.destination.display(),
            self.missing,
            self.failures.len(),
            self.duration.as_secs_f64()
        )
    }
}
