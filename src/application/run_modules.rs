//! Run modules use case
//!
//! Runs every selected module against one source, one at a time, and merges
//! their timelines. A module that fails or panics is reported and skipped;
//! the rest of the run carries on.

use crate::application::dto::{ModuleReport, ModuleStatus, RunOptions, RunSummary};
use crate::domain::entities::TimelineEvent;
use crate::domain::repositories::{
    IndicatorOutcome, IndicatorSet, Module, ModuleContext, ModuleError, PersistenceError,
    ResultStore, RunOutcome, SourceKind,
};
use crate::domain::services::{ModuleDescriptor, ModuleRegistry, TimelineAggregator};
use crate::infrastructure::persistence::LocalResultStore;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use tracing::{error, info, info_span, warn};

pub const TIMELINE_FILE: &str = "timeline.csv";
pub const TIMELINE_DETECTED_FILE: &str = "timeline_detected.csv";

/// Everything a module produced, gathered before anything is persisted
pub(crate) struct ModuleOutput {
    pub status: ModuleStatus,
    pub timeline: Vec<TimelineEvent>,
    pub timeline_detected: Vec<TimelineEvent>,
    pub snapshot: Option<serde_json::Value>,
    pub detected_snapshot: Option<serde_json::Value>,
}

impl ModuleOutput {
    fn status_only(status: ModuleStatus) -> Self {
        Self {
            status,
            timeline: Vec::new(),
            timeline_detected: Vec::new(),
            snapshot: None,
            detected_snapshot: None,
        }
    }
}

/// Runs a module registry against a source
pub struct ExecutionDriver<'a> {
    registry: &'a ModuleRegistry,
}

impl<'a> ExecutionDriver<'a> {
    pub fn new(registry: &'a ModuleRegistry) -> Self {
        Self { registry }
    }

    /// Runs every module supporting `kind`, in registry order.
    ///
    /// Only persistence failures end the run early.
    pub fn run_all(
        &self,
        source: &Path,
        kind: SourceKind,
        indicators: Option<&dyn IndicatorSet>,
        options: &RunOptions,
    ) -> Result<RunSummary, PersistenceError> {
        let store = options
            .output
            .as_deref()
            .map(LocalResultStore::new)
            .transpose()?;

        let mut summary = RunSummary::default();
        let mut aggregator = TimelineAggregator::new();

        for descriptor in self.registry.select(kind, options.module.as_deref()) {
            let span = info_span!("module", name = descriptor.name);
            let _guard = span.enter();

            let ctx = ModuleContext::new(descriptor.name, source, kind)
                .with_output(options.output.as_deref())
                .with_fast_mode(options.fast_mode);

            let output = run_isolated(descriptor, || {
                let mut module = descriptor.build(ctx);
                run_module(module.as_mut(), indicators)
            });

            let saved = match &store {
                Some(store) => persist(store, descriptor, &output)?,
                None => Vec::new(),
            };

            aggregator.add(output.timeline, output.timeline_detected);
            summary.modules.push(ModuleReport {
                name: descriptor.name,
                slug: descriptor.slug,
                status: output.status,
                saved,
            });
        }

        let (timeline, timeline_detected) = aggregator.finish();
        if let Some(store) = &store {
            store.save_timeline(TIMELINE_FILE, &timeline)?;
            store.save_timeline(TIMELINE_DETECTED_FILE, &timeline_detected)?;
        }

        summary.timeline = timeline;
        summary.timeline_detected = timeline_detected;
        Ok(summary)
    }
}

/// Extracts, checks and serializes one module.
pub(crate) fn run_module(
    module: &mut dyn Module,
    indicators: Option<&dyn IndicatorSet>,
) -> Result<ModuleOutput, ModuleError> {
    match module.run() {
        Ok(RunOutcome::Ran { .. }) => {}
        Ok(RunOutcome::NotSupported) => {
            info!("The {} module does not support extraction", module.name());
            return Ok(ModuleOutput::status_only(ModuleStatus::NotSupported));
        }
        Err(e) if e.is_not_found() => {
            info!("There might be no data to extract by module {}: {}", module.name(), e);
            return Ok(ModuleOutput::status_only(ModuleStatus::ArtifactNotFound));
        }
        Err(e) => return Err(e),
    }

    let detected = match indicators {
        Some(indicators) => match module.check_indicators(indicators)? {
            IndicatorOutcome::Checked { detected } => {
                info!("The {} module produced {} detections", module.name(), detected);
                Some(detected)
            }
            IndicatorOutcome::NotSupported => {
                info!("The {} module does not support checking for indicators", module.name());
                None
            }
        },
        None => None,
    };

    Ok(ModuleOutput {
        status: ModuleStatus::Completed {
            results: module.result_count(),
            detected,
        },
        timeline: module.timeline(),
        timeline_detected: module.timeline_detected(),
        snapshot: Some(module.snapshot()?),
        detected_snapshot: Some(module.detected_snapshot()?),
    })
}

/// Runs `f`, turning module errors and panics into a failed status
pub(crate) fn run_isolated<F>(descriptor: &ModuleDescriptor, f: F) -> ModuleOutput
where
    F: FnOnce() -> Result<ModuleOutput, ModuleError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            error!("Error in running extraction from module {}: {}", descriptor.name, e);
            ModuleOutput::status_only(ModuleStatus::Failed {
                error: e.to_string(),
            })
        }
        Err(payload) => {
            let e = ModuleError::Panicked {
                module: descriptor.name,
                message: panic_message(payload.as_ref()),
            };
            error!("{}", e);
            ModuleOutput::status_only(ModuleStatus::Failed {
                error: e.to_string(),
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn persist(
    store: &LocalResultStore,
    descriptor: &ModuleDescriptor,
    output: &ModuleOutput,
) -> Result<Vec<std::path::PathBuf>, PersistenceError> {
    let mut saved = Vec::new();

    if let Some(snapshot) = &output.snapshot {
        saved.extend(store.save_results(descriptor.slug, snapshot)?);
    }
    if let Some(detected) = &output.detected_snapshot {
        if let Some(path) = store.save_detected(descriptor.slug, detected)? {
            warn!(
                "Module {} detected suspicious records, saved to {}",
                descriptor.name,
                path.display()
            );
            saved.push(path);
        }
    }

    Ok(saved)
}
