//! STIX 2 indicator files
//!
//! Only the `indicator` objects of a bundle are used, and only patterns of
//! the form `[<object>:<property> = '<value>']`. The first `malware` object
//! names the collection.

use crate::domain::repositories::{IndicatorKind, IndicatorMatch, IndicatorSet};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\s*([a-z0-9-]+):([a-z_.]+)\s*=\s*'(.*)'\s*\]$").expect("static pattern")
});

/// Process names longer than this are truncated by the kernel
const PROCESS_NAME_MAX: usize = 16;

#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Cannot read indicators file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid indicators file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct Bundle {
    #[serde(default)]
    objects: Vec<StixObject>,
}

#[derive(Debug, Deserialize)]
struct StixObject {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
}

#[derive(Debug, Clone)]
struct Ioc {
    value: String,
    collection: String,
}

/// Indicators loaded from one or more STIX 2 bundles
#[derive(Debug, Default)]
pub struct StixIndicators {
    domains: Vec<Ioc>,
    processes: Vec<Ioc>,
    emails: Vec<Ioc>,
    file_names: Vec<Ioc>,
    file_paths: Vec<Ioc>,
}

impl StixIndicators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(paths: &[PathBuf]) -> Result<Self, IndicatorError> {
        let mut indicators = Self::new();
        for path in paths {
            indicators.load_file(path)?;
        }
        Ok(indicators)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<usize, IndicatorError> {
        info!("Loading indicators from {}", path.display());
        let data = fs::read_to_string(path).map_err(|source| IndicatorError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let fallback = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let added = self
            .add_bundle(&data, &fallback)
            .map_err(|source| IndicatorError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Loaded {} indicators from {}", added, path.display());
        Ok(added)
    }

    /// Adds every supported indicator of a bundle, returning how many
    pub fn add_bundle(&mut self, json: &str, fallback_name: &str) -> Result<usize, serde_json::Error> {
        let bundle: Bundle = serde_json::from_str(json)?;

        let collection = bundle
            .objects
            .iter()
            .find(|obj| obj.kind == "malware")
            .and_then(|obj| obj.name.clone())
            .unwrap_or_else(|| fallback_name.to_string());

        let mut added = 0;
        for pattern in bundle
            .objects
            .iter()
            .filter(|obj| obj.kind == "indicator")
            .filter_map(|obj| obj.pattern.as_deref())
        {
            let Some((kind, value)) = parse_pattern(pattern) else {
                debug!("Skipping unsupported pattern {}", pattern);
                continue;
            };
            let ioc = Ioc {
                value,
                collection: collection.clone(),
            };
            match kind {
                IndicatorKind::Domain => self.domains.push(ioc),
                IndicatorKind::Process => self.processes.push(ioc),
                IndicatorKind::Email => self.emails.push(ioc),
                IndicatorKind::FileName => self.file_names.push(ioc),
                IndicatorKind::FilePath => self.file_paths.push(ioc),
            }
            added += 1;
        }
        Ok(added)
    }
}

/// Parses a STIX comparison pattern into an indicator kind and value.
///
/// Domain and email values are lowercased.
pub fn parse_pattern(pattern: &str) -> Option<(IndicatorKind, String)> {
    let caps = PATTERN.captures(pattern.trim())?;
    let value = caps[3].to_string();

    match (&caps[1], &caps[2]) {
        ("domain-name", "value") => Some((IndicatorKind::Domain, value.to_lowercase())),
        ("process", "name") => Some((IndicatorKind::Process, value)),
        ("email-addr", "value") => Some((IndicatorKind::Email, value.to_lowercase())),
        ("file", "name") => Some((IndicatorKind::FileName, value)),
        ("file", "path") => Some((IndicatorKind::FilePath, value)),
        _ => None,
    }
}

/// Lowercased host part of a URL, or the input itself when it is a bare host
pub fn extract_host(url: &str) -> String {
    let rest = url.trim();
    let rest = match rest.find("://") {
        Some(pos) => &rest[pos + 3..],
        None => rest,
    };
    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();

    let host = if let Some(stripped) = host_port.strip_prefix('[') {
        stripped.split(']').next().unwrap_or_default()
    } else {
        host_port.split(':').next().unwrap_or_default()
    };

    host.trim_end_matches('.').to_lowercase()
}

fn hit(kind: IndicatorKind, ioc: &Ioc) -> IndicatorMatch {
    IndicatorMatch {
        kind,
        value: ioc.value.clone(),
        collection: ioc.collection.clone(),
    }
}

impl IndicatorSet for StixIndicators {
    fn check_domain(&self, url: &str) -> Option<IndicatorMatch> {
        let host = extract_host(url);
        if host.is_empty() {
            return None;
        }

        self.domains
            .iter()
            .find(|ioc| {
                host == ioc.value
                    || host
                        .strip_suffix(ioc.value.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
            .map(|ioc| hit(IndicatorKind::Domain, ioc))
    }

    fn find_domain_in(&self, text: &str) -> Option<IndicatorMatch> {
        let text = text.to_lowercase();
        self.domains
            .iter()
            .find(|ioc| !ioc.value.is_empty() && text.contains(ioc.value.as_str()))
            .map(|ioc| hit(IndicatorKind::Domain, ioc))
    }

    fn check_process(&self, name: &str) -> Option<IndicatorMatch> {
        if name.is_empty() {
            return None;
        }

        let truncated = name.chars().count() == PROCESS_NAME_MAX;
        self.processes
            .iter()
            .find(|ioc| ioc.value == name || (truncated && ioc.value.starts_with(name)))
            .map(|ioc| hit(IndicatorKind::Process, ioc))
    }

    fn check_file_path(&self, path: &str) -> Option<IndicatorMatch> {
        if path.is_empty() {
            return None;
        }

        let basename = path.rsplit('/').next().unwrap_or(path);
        if let Some(ioc) = self.file_names.iter().find(|ioc| ioc.value == basename) {
            return Some(hit(IndicatorKind::FileName, ioc));
        }

        self.file_paths
            .iter()
            .find(|ioc| !ioc.value.is_empty() && path.starts_with(ioc.value.as_str()))
            .map(|ioc| hit(IndicatorKind::FilePath, ioc))
    }

    fn check_email(&self, address: &str) -> Option<IndicatorMatch> {
        let address = address.trim().to_lowercase();
        self.emails
            .iter()
            .find(|ioc| ioc.value == address)
            .map(|ioc| hit(IndicatorKind::Email, ioc))
    }

    fn len(&self) -> usize {
        self.domains.len()
            + self.processes.len()
            + self.emails.len()
            + self.file_names.len()
            + self.file_paths.len()
    }
}
