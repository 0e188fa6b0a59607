//! Indicator set trait
//!
//! Read-only predicates over a loaded set of indicators of compromise.
//! Matching semantics belong to the implementation; modules treat every
//! answer as authoritative.

use std::fmt;

/// Kind of indicator that produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Domain,
    Process,
    Email,
    FileName,
    FilePath,
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndicatorKind::Domain => "domain",
            IndicatorKind::Process => "process",
            IndicatorKind::Email => "email address",
            IndicatorKind::FileName => "file name",
            IndicatorKind::FilePath => "file path",
        };
        f.write_str(name)
    }
}

/// The indicator that matched a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorMatch {
    pub kind: IndicatorKind,
    /// Indicator value as written in the indicator file
    pub value: String,
    /// Name of the collection (campaign, malware family) it belongs to
    pub collection: String,
}

/// Predicate provider consulted by modules when checking their results.
///
/// Shared by reference across all modules of a run; implementations must not
/// carry per-module state.
pub trait IndicatorSet: Send + Sync {
    /// Checks a URL or bare host name against domain indicators
    fn check_domain(&self, url: &str) -> Option<IndicatorMatch>;

    /// Checks several URLs, returning the first match
    fn check_domains(&self, urls: &[&str]) -> Option<IndicatorMatch> {
        urls.iter().find_map(|url| self.check_domain(url))
    }

    /// Finds any domain indicator appearing verbatim inside `text`
    fn find_domain_in(&self, text: &str) -> Option<IndicatorMatch>;

    /// Checks a process name
    fn check_process(&self, name: &str) -> Option<IndicatorMatch>;

    /// Checks a file path against file name and file path indicators
    fn check_file_path(&self, path: &str) -> Option<IndicatorMatch>;

    /// Checks an email address
    fn check_email(&self, address: &str) -> Option<IndicatorMatch>;

    /// Total number of loaded indicators
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
