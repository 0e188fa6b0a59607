//! Backup manifest
//!
//! Every file recorded in a plaintext `Manifest.db`, with the timestamps
//! from its archived metadata.

use crate::domain::entities::TimelineEvent;
use crate::domain::repositories::{
    Extractor, IndicatorMatch, IndicatorSet, ModuleContext, ModuleError, SourceKind,
};
use crate::infrastructure::backup::{read_manifest, ManifestDbError, MANIFEST_DB};
use crate::infrastructure::modules::time::from_unix_time;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub file_id: String,
    pub domain: String,
    pub relative_path: String,
    pub flags: i64,
    pub size: Option<u64>,
    /// Permission bits in octal
    pub mode: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub status_changed: Option<DateTime<Utc>>,
}

impl ManifestRecord {
    /// MACB-style marker of which timestamps equal `ts`
    fn macb(&self, ts: DateTime<Utc>) -> String {
        let flag = |field: Option<DateTime<Utc>>, c: char| if field == Some(ts) { c } else { '-' };
        [
            flag(self.modified, 'M'),
            '-',
            flag(self.status_changed, 'C'),
            flag(self.created, 'B'),
        ]
        .iter()
        .collect()
    }
}

pub struct Manifest;

impl Manifest {
    fn database_path(ctx: &ModuleContext) -> PathBuf {
        ctx.source.join(MANIFEST_DB)
    }

    fn map_error(path: &Path, e: ManifestDbError) -> ModuleError {
        match e {
            ManifestDbError::Sqlite { source, .. } => ModuleError::Database {
                module: Self::NAME,
                path: path.to_path_buf(),
                message: source.to_string(),
            },
            ManifestDbError::Metadata(message) => ModuleError::Malformed {
                module: Self::NAME,
                path: path.to_path_buf(),
                message,
            },
        }
    }
}

impl Extractor for Manifest {
    type Record = ManifestRecord;

    const NAME: &'static str = "Manifest";
    const SLUG: &'static str = "manifest";
    const CHECKS_INDICATORS: bool = true;

    fn new(_ctx: &ModuleContext) -> Self {
        Manifest
    }

    fn locate(&self, ctx: &ModuleContext) -> Result<PathBuf, ModuleError> {
        let path = Self::database_path(ctx);
        if ctx.kind == SourceKind::Backup && path.is_file() {
            return Ok(path);
        }
        Err(ModuleError::ArtifactNotFound {
            module: Self::NAME,
            searched: vec![MANIFEST_DB.to_string()],
        })
    }

    fn run(&self, ctx: &ModuleContext) -> Result<Vec<ManifestRecord>, ModuleError> {
        let path = self.locate(ctx)?;
        info!("Found Manifest.db database at path: {}", path.display());

        let files = read_manifest(&path).map_err(|e| Self::map_error(&path, e))?;
        let records: Vec<ManifestRecord> = files
            .into_iter()
            .map(|file| ManifestRecord {
                file_id: file.entry.file_id,
                domain: file.entry.domain,
                relative_path: file.entry.relative_path,
                flags: file.entry.kind.flags(),
                size: file.metadata.size,
                mode: file.metadata.mode.map(|m| format!("{:o}", m)),
                created: file.metadata.birth.and_then(from_unix_time),
                modified: file.metadata.last_modified.and_then(from_unix_time),
                status_changed: file.metadata.last_status_change.and_then(from_unix_time),
            })
            .collect();

        info!("Extracted a total of {} file metadata items", records.len());
        Ok(records)
    }

    fn serialize(&self, record: &ManifestRecord) -> Vec<TimelineEvent> {
        let mut timestamps: Vec<DateTime<Utc>> = [record.created, record.modified, record.status_changed]
            .into_iter()
            .flatten()
            .collect();
        timestamps.sort();
        timestamps.dedup();

        timestamps
            .into_iter()
            .map(|ts| {
                TimelineEvent::new(
                    Some(ts),
                    Self::NAME,
                    record.macb(ts),
                    format!("{}--{}", record.domain, record.relative_path),
                )
            })
            .collect()
    }

    fn check_record(
        &self,
        record: &ManifestRecord,
        indicators: &dyn IndicatorSet,
    ) -> Result<Option<IndicatorMatch>, ModuleError> {
        if record.relative_path.is_empty() {
            return Ok(None);
        }

        Ok(indicators
            .check_file_path(&record.relative_path)
            .or_else(|| indicators.find_domain_in(&record.relative_path)))
    }
}
