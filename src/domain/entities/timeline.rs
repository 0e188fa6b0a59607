//! Timeline events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rendering of timestamps in persisted timelines
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Normalized, human-readable view of one extracted record.
///
/// Field order defines the ordering used by the timeline merge: timestamp
/// first (events without one sort before all others), then module, event
/// kind and description.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: Option<DateTime<Utc>>,
    pub module: String,
    pub event: String,
    pub data: String,
}

impl TimelineEvent {
    pub fn new(
        timestamp: Option<DateTime<Utc>>,
        module: &str,
        event: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            module: module.to_string(),
            event: event.into(),
            data: data.into(),
        }
    }

    /// Timestamp as written to timeline files; empty when unknown
    pub fn timestamp_string(&self) -> String {
        self.timestamp
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default()
    }
}
