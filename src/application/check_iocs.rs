//! Check stored results use case
//!
//! Re-checks the JSON snapshots of an earlier run against a new indicator
//! set, without touching the original source.

use crate::application::dto::{ModuleReport, ModuleStatus};
use crate::application::run_modules::{run_isolated, ModuleOutput};
use crate::domain::repositories::{IndicatorOutcome, IndicatorSet, PersistenceError};
use crate::domain::services::ModuleRegistry;
use crate::infrastructure::persistence::{list_snapshots, read_snapshot};
use std::path::Path;
use tracing::{error, info, info_span};

/// Restores every snapshot in `folder` whose file stem is a module slug and
/// checks it against `indicators`.
///
/// Snapshots of modules that cannot check indicators are reported as
/// `NotSupported`. A snapshot that cannot be read is reported as `Failed`
/// and the remaining ones are still checked. Files matching no slug are
/// ignored.
pub fn check_stored_results(
    registry: &ModuleRegistry,
    folder: &Path,
    indicators: &dyn IndicatorSet,
    only: Option<&str>,
) -> Result<Vec<ModuleReport>, PersistenceError> {
    info!("Checking stored results against provided indicators...");
    let mut reports = Vec::new();

    for stored in list_snapshots(folder)? {
        let Some(descriptor) = registry.find_by_slug(&stored.stem) else {
            continue;
        };
        if only.is_some_and(|name| name != descriptor.name) {
            continue;
        }

        let span = info_span!("module", name = descriptor.name);
        let _guard = span.enter();

        info!(
            "Loading results from \"{}\" with module {}",
            stored.path.display(),
            descriptor.name
        );
        let data = match read_snapshot(&stored.path) {
            Ok(data) => data,
            Err(e) => {
                error!("Cannot load results of module {}: {}", descriptor.name, e);
                reports.push(ModuleReport {
                    name: descriptor.name,
                    slug: descriptor.slug,
                    status: ModuleStatus::Failed {
                        error: e.to_string(),
                    },
                    saved: Vec::new(),
                });
                continue;
            }
        };

        let output = run_isolated(descriptor, || {
            let mut module = descriptor.restore(data)?;
            let status = match module.check_indicators(indicators)? {
                IndicatorOutcome::Checked { detected } => {
                    info!("The {} module produced {} detections", descriptor.name, detected);
                    ModuleStatus::Completed {
                        results: module.result_count(),
                        detected: Some(detected),
                    }
                }
                IndicatorOutcome::NotSupported => {
                    info!(
                        "The {} module does not support checking for indicators",
                        descriptor.name
                    );
                    ModuleStatus::NotSupported
                }
            };
            Ok(ModuleOutput {
                status,
                timeline: module.timeline(),
                timeline_detected: module.timeline_detected(),
                snapshot: None,
                detected_snapshot: None,
            })
        });

        reports.push(ModuleReport {
            name: descriptor.name,
            slug: descriptor.slug,
            status: output.status,
            saved: Vec::new(),
        });
    }

    Ok(reports)
}
