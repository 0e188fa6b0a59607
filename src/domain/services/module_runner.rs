//! Module runner
//!
//! Wraps a typed [`Extractor`] and owns its results, presenting it to the
//! execution driver as a [`Module`].

use crate::domain::entities::TimelineEvent;
use crate::domain::repositories::{
    Extractor, IndicatorOutcome, IndicatorSet, Module, ModuleContext, ModuleError, RunOutcome,
};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Owns one extractor instance and its result sequences.
///
/// Results only grow during `run`; the detected subset is rebuilt by each
/// call to `check_indicators`.
pub struct ModuleRunner<E: Extractor> {
    extractor: E,
    ctx: ModuleContext,
    results: Vec<E::Record>,
    detected: Vec<E::Record>,
}

impl<E: Extractor> ModuleRunner<E> {
    pub fn new(ctx: ModuleContext) -> Self {
        Self {
            extractor: E::new(&ctx),
            ctx,
            results: Vec::new(),
            detected: Vec::new(),
        }
    }

    /// Rebuilds a module from a persisted JSON array of records.
    ///
    /// The artifact path and any other extraction-time context is not part
    /// of the snapshot and is not recovered.
    pub fn from_snapshot(ctx: ModuleContext, data: serde_json::Value) -> Result<Self, ModuleError> {
        let results: Vec<E::Record> =
            serde_json::from_value(data).map_err(|source| ModuleError::Snapshot {
                module: E::NAME,
                source,
            })?;

        let mut runner = Self::new(ctx);
        runner.results = results;
        Ok(runner)
    }

    pub fn results(&self) -> &[E::Record] {
        &self.results
    }

    pub fn detected(&self) -> &[E::Record] {
        &self.detected
    }

    fn events_for(&self, records: &[E::Record]) -> Vec<TimelineEvent> {
        let mut seen = HashSet::new();
        records
            .iter()
            .flat_map(|record| self.extractor.serialize(record))
            .filter(|event| seen.insert(event.clone()))
            .collect()
    }

    fn to_json(&self, records: &[E::Record]) -> Result<serde_json::Value, ModuleError> {
        serde_json::to_value(records).map_err(|source| ModuleError::Snapshot {
            module: E::NAME,
            source,
        })
    }
}

impl<E: Extractor> Module for ModuleRunner<E> {
    fn name(&self) -> &'static str {
        E::NAME
    }

    fn slug(&self) -> &'static str {
        E::SLUG
    }

    fn context(&self) -> &ModuleContext {
        &self.ctx
    }

    fn locate(&self) -> Result<PathBuf, ModuleError> {
        self.extractor.locate(&self.ctx)
    }

    fn run(&mut self) -> Result<RunOutcome, ModuleError> {
        match self.extractor.run(&self.ctx) {
            Ok(records) => {
                let count = records.len();
                self.results.extend(records);
                info!("Extracted {} records", count);
                Ok(RunOutcome::Ran { count })
            }
            Err(e) if e.is_not_supported() => {
                debug!("{}", e);
                Ok(RunOutcome::NotSupported)
            }
            Err(e) => Err(e),
        }
    }

    fn check_indicators(
        &mut self,
        indicators: &dyn IndicatorSet,
    ) -> Result<IndicatorOutcome, ModuleError> {
        if !E::CHECKS_INDICATORS {
            self.detected.clear();
            return Ok(IndicatorOutcome::NotSupported);
        }

        let mut detected = Vec::new();

        for record in &self.results {
            match self.extractor.check_record(record, indicators) {
                Ok(Some(hit)) => {
                    warn!(
                        indicator = %hit.value,
                        collection = %hit.collection,
                        "Found a known suspicious {}",
                        hit.kind
                    );
                    detected.push(record.clone());
                }
                Ok(None) => {}
                Err(e) if e.is_not_supported() => return Ok(IndicatorOutcome::NotSupported),
                Err(e) => return Err(e),
            }
        }

        self.detected = detected;
        Ok(IndicatorOutcome::Checked {
            detected: self.detected.len(),
        })
    }

    fn result_count(&self) -> usize {
        self.results.len()
    }

    fn detected_count(&self) -> usize {
        self.detected.len()
    }

    fn timeline(&self) -> Vec<TimelineEvent> {
        self.events_for(&self.results)
    }

    fn timeline_detected(&self) -> Vec<TimelineEvent> {
        self.events_for(&self.detected)
    }

    fn snapshot(&self) -> Result<serde_json::Value, ModuleError> {
        self.to_json(&self.results)
    }

    fn detected_snapshot(&self) -> Result<serde_json::Value, ModuleError> {
        self.to_json(&self.detected)
    }
}
