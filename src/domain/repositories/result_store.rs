//! Result store trait
//!
//! Persistence of module snapshots and merged timelines.

use crate::domain::entities::TimelineEvent;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while writing or reading persisted results.
///
/// Write failures abort the command: results that cannot be saved are lost.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot write timeline {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// A persisted snapshot found in a results folder
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    /// File name without extension
    pub stem: String,
    pub path: PathBuf,
}

/// Destination for module snapshots and timelines
pub trait ResultStore {
    fn output_dir(&self) -> &Path;

    /// Writes `<slug>.json`; returns `None` when there was nothing to write
    fn save_results(
        &self,
        slug: &str,
        results: &serde_json::Value,
    ) -> Result<Option<PathBuf>, PersistenceError>;

    /// Writes `<slug>_detected.json`; returns `None` when there was nothing to write
    fn save_detected(
        &self,
        slug: &str,
        detected: &serde_json::Value,
    ) -> Result<Option<PathBuf>, PersistenceError>;

    /// Writes a timeline table; returns `None` when `events` is empty
    fn save_timeline(
        &self,
        file_name: &str,
        events: &[TimelineEvent],
    ) -> Result<Option<PathBuf>, PersistenceError>;
}
