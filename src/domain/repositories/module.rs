//! Extraction module contract
//!
//! Two layers: [`Extractor`] is what an artifact parser implements, with its
//! own typed record; [`Module`] is the object-safe view the execution driver
//! works with. `ModuleRunner` bridges the two.

use crate::domain::entities::TimelineEvent;
use crate::domain::repositories::{IndicatorMatch, IndicatorSet};
use crate::domain::services::locate_artifact;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// What kind of tree a module is pointed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A decrypted (or never encrypted) backup, content-addressed by file id
    Backup,
    /// A raw filesystem dump
    FileSystem,
    /// No source; results were restored from a persisted snapshot
    Snapshot,
}

/// Everything a module is constructed with.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    /// Module name, used as logging context
    pub module: &'static str,
    pub source: PathBuf,
    pub kind: SourceKind,
    pub output: Option<PathBuf>,
    pub fast_mode: bool,
}

impl ModuleContext {
    pub fn new(module: &'static str, source: &Path, kind: SourceKind) -> Self {
        Self {
            module,
            source: source.to_path_buf(),
            kind,
            output: None,
            fast_mode: false,
        }
    }

    /// Context for a module rebuilt from persisted results
    pub fn snapshot(module: &'static str) -> Self {
        Self::new(module, Path::new(""), SourceKind::Snapshot)
    }

    pub fn with_output(mut self, output: Option<&Path>) -> Self {
        self.output = output.map(Path::to_path_buf);
        self
    }

    pub fn with_fast_mode(mut self, fast_mode: bool) -> Self {
        self.fast_mode = fast_mode;
        self
    }
}

/// Errors scoped to a single module.
///
/// None of these stop sibling modules.
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("{module}: artifact not found (searched {searched:?})")]
    ArtifactNotFound {
        module: &'static str,
        searched: Vec<String>,
    },

    #[error("{module}: {operation} is not supported")]
    NotSupported {
        module: &'static str,
        operation: &'static str,
    },

    #[error("{module}: database error in {path}: {message}")]
    Database {
        module: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("{module}: malformed data in {path}: {message}")]
    Malformed {
        module: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("{module}: I/O error on {path}: {source}")]
    Io {
        module: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{module}: invalid snapshot: {source}")]
    Snapshot {
        module: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{module}: panicked: {message}")]
    Panicked {
        module: &'static str,
        message: String,
    },
}

impl ModuleError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ModuleError::ArtifactNotFound { .. })
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, ModuleError::NotSupported { .. })
    }
}

/// Result of asking a module to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The module has no live extraction for this source
    NotSupported,
    /// Extraction ran; `count` may be zero
    Ran { count: usize },
}

/// Result of asking a module to check its records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorOutcome {
    NotSupported,
    Checked { detected: usize },
}

/// A typed artifact parser.
///
/// Implementations describe where their artifact lives, how to turn it into
/// records, how records appear on the timeline and which records match an
/// indicator set.
pub trait Extractor: Sized {
    type Record: Serialize + DeserializeOwned + Clone + 'static;

    /// Display name, also the `--module` filter value
    const NAME: &'static str;
    /// Snapshot file stem; unique within a registry
    const SLUG: &'static str;
    /// Content identifiers of the artifact inside a backup
    const BACKUP_IDS: &'static [&'static str] = &[];
    /// Path templates of the artifact inside a filesystem dump
    const ROOT_PATHS: &'static [&'static str] = &[];
    /// Whether `check_record` is implemented
    const CHECKS_INDICATORS: bool = false;

    fn new(ctx: &ModuleContext) -> Self;

    /// Finds the artifact for the context's source
    fn locate(&self, ctx: &ModuleContext) -> Result<PathBuf, ModuleError> {
        locate_artifact(ctx, Self::BACKUP_IDS, Self::ROOT_PATHS)
    }

    /// Locates the artifact and parses it into records.
    ///
    /// Modules that can only re-check persisted results keep the default.
    fn run(&self, _ctx: &ModuleContext) -> Result<Vec<Self::Record>, ModuleError> {
        Err(ModuleError::NotSupported {
            module: Self::NAME,
            operation: "run",
        })
    }

    /// Timeline events for a record; empty when it has none
    fn serialize(&self, record: &Self::Record) -> Vec<TimelineEvent>;

    /// Checks one record, returning the first matching indicator.
    ///
    /// Only called when `CHECKS_INDICATORS` is set.
    fn check_record(
        &self,
        _record: &Self::Record,
        _indicators: &dyn IndicatorSet,
    ) -> Result<Option<IndicatorMatch>, ModuleError> {
        Err(ModuleError::NotSupported {
            module: Self::NAME,
            operation: "check_indicators",
        })
    }
}

/// Object-safe module handle used by the execution driver.
pub trait Module {
    fn name(&self) -> &'static str;

    fn slug(&self) -> &'static str;

    fn context(&self) -> &ModuleContext;

    /// Finds the module's artifact without extracting it
    fn locate(&self) -> Result<PathBuf, ModuleError>;

    /// Extracts records from the located artifact
    fn run(&mut self) -> Result<RunOutcome, ModuleError>;

    /// Recomputes the detected subset against an indicator set
    fn check_indicators(
        &mut self,
        indicators: &dyn IndicatorSet,
    ) -> Result<IndicatorOutcome, ModuleError>;

    fn result_count(&self) -> usize;

    fn detected_count(&self) -> usize;

    /// Timeline events of all results, de-duplicated
    fn timeline(&self) -> Vec<TimelineEvent>;

    /// Timeline events of detected results, de-duplicated
    fn timeline_detected(&self) -> Vec<TimelineEvent>;

    /// Results as a JSON array, the format `from_snapshot` reads back
    fn snapshot(&self) -> Result<serde_json::Value, ModuleError>;

    fn detected_snapshot(&self) -> Result<serde_json::Value, ModuleError>;
}
