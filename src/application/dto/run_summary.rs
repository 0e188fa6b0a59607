//! Run summary DTO

use crate::domain::entities::TimelineEvent;
use std::path::PathBuf;

/// What happened to one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Extraction ran; `detected` is set when indicators were checked
    Completed {
        results: usize,
        detected: Option<usize>,
    },
    /// The module cannot do the requested operation for this source
    NotSupported,
    /// The module's artifact is not in the source
    ArtifactNotFound,
    /// The module failed or panicked; siblings were not affected
    Failed { error: String },
}

impl ModuleStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, ModuleStatus::Failed { .. })
    }
}

/// Per-module line of a run summary
#[derive(Debug, Clone)]
pub struct ModuleReport {
    pub name: &'static str,
    pub slug: &'static str,
    pub status: ModuleStatus,
    /// Snapshot files written for this module
    pub saved: Vec<PathBuf>,
}

/// Result of running a set of modules
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub modules: Vec<ModuleReport>,
    /// Merged timeline of all results
    pub timeline: Vec<TimelineEvent>,
    /// Merged timeline of detected results
    pub timeline_detected: Vec<TimelineEvent>,
}

impl RunSummary {
    pub fn report(&self, name: &str) -> Option<&ModuleReport> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn total_results(&self) -> usize {
        self.modules
            .iter()
            .map(|m| match m.status {
                ModuleStatus::Completed { results, .. } => results,
                _ => 0,
            })
            .sum()
    }

    pub fn total_detected(&self) -> usize {
        self.modules
            .iter()
            .map(|m| match m.status {
                ModuleStatus::Completed {
                    detected: Some(d), ..
                } => d,
                _ => 0,
            })
            .sum()
    }

    pub fn failed(&self) -> usize {
        self.modules.iter().filter(|m| m.status.is_failed()).count()
    }
}
