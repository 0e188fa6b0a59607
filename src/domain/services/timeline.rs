//! Timeline aggregation
//!
//! Merges per-module event sequences into one totally ordered sequence.

use crate::domain::entities::TimelineEvent;

/// Concatenates and sorts event sequences.
///
/// The order is total (timestamp with undated events first, then module,
/// event kind and description), so any permutation of the input yields the
/// same output.
pub fn merge<I>(sequences: I) -> Vec<TimelineEvent>
where
    I: IntoIterator<Item = Vec<TimelineEvent>>,
{
    let mut merged: Vec<TimelineEvent> = sequences.into_iter().flatten().collect();
    merged.sort();
    merged
}

/// Collects the timeline and detected timeline of every module in a run
#[derive(Debug, Default)]
pub struct TimelineAggregator {
    all: Vec<Vec<TimelineEvent>>,
    detected: Vec<Vec<TimelineEvent>>,
}

impl TimelineAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, timeline: Vec<TimelineEvent>, detected: Vec<TimelineEvent>) {
        self.all.push(timeline);
        self.detected.push(detected);
    }

    /// Returns the merged `(all, detected)` sequences
    pub fn finish(self) -> (Vec<TimelineEvent>, Vec<TimelineEvent>) {
        (merge(self.all), merge(self.detected))
    }
}
