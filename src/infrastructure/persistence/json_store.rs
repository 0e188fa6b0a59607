//! Local result store
//!
//! Writes module snapshots as pretty-printed JSON and timelines as CSV into
//! one output directory.

use crate::domain::entities::TimelineEvent;
use crate::domain::repositories::{PersistenceError, ResultStore, StoredSnapshot};
use crate::infrastructure::persistence::timeline_csv::write_timeline;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Result store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalResultStore {
    output_dir: PathBuf,
}

impl LocalResultStore {
    /// Opens the store, creating the directory if needed
    pub fn new(output_dir: &Path) -> Result<Self, PersistenceError> {
        fs::create_dir_all(output_dir).map_err(|source| PersistenceError::CreateDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    fn write_json(&self, file_name: &str, value: &serde_json::Value) -> Result<PathBuf, PersistenceError> {
        let path = self.output_dir.join(file_name);
        let data = serde_json::to_vec_pretty(value).map_err(|source| PersistenceError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, data).map_err(|source| PersistenceError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

fn is_empty_array(value: &serde_json::Value) -> bool {
    value.as_array().is_some_and(Vec::is_empty)
}

impl ResultStore for LocalResultStore {
    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn save_results(
        &self,
        slug: &str,
        results: &serde_json::Value,
    ) -> Result<Option<PathBuf>, PersistenceError> {
        let path = self.write_json(&format!("{slug}.json"), results)?;
        info!("Saved results to {}", path.display());
        Ok(Some(path))
    }

    fn save_detected(
        &self,
        slug: &str,
        detected: &serde_json::Value,
    ) -> Result<Option<PathBuf>, PersistenceError> {
        if is_empty_array(detected) {
            return Ok(None);
        }
        let path = self.write_json(&format!("{slug}_detected.json"), detected)?;
        info!("Saved detected results to {}", path.display());
        Ok(Some(path))
    }

    fn save_timeline(
        &self,
        file_name: &str,
        events: &[TimelineEvent],
    ) -> Result<Option<PathBuf>, PersistenceError> {
        if events.is_empty() {
            return Ok(None);
        }
        let path = self.output_dir.join(file_name);
        write_timeline(&path, events)?;
        info!("Saved {} timeline events to {}", events.len(), path.display());
        Ok(Some(path))
    }
}

/// Lists the `*.json` snapshots in `dir`, sorted by file name
pub fn list_snapshots(dir: &Path) -> Result<Vec<StoredSnapshot>, PersistenceError> {
    let entries = fs::read_dir(dir).map_err(|source| PersistenceError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut snapshots: Vec<StoredSnapshot> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .filter_map(|path| {
            let stem = path.file_stem()?.to_string_lossy().into_owned();
            Some(StoredSnapshot { stem, path })
        })
        .collect();
    snapshots.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(snapshots)
}

pub fn read_snapshot(path: &Path) -> Result<serde_json::Value, PersistenceError> {
    let data = fs::read(path).map_err(|source| PersistenceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })
}
