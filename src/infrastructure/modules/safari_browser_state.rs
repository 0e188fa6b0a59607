//! Safari browser state
//!
//! Open tabs and their back/forward history from `BrowserState.db`.

use crate::domain::entities::TimelineEvent;
use crate::domain::repositories::{
    Extractor, IndicatorMatch, IndicatorSet, ModuleContext, ModuleError,
};
use crate::infrastructure::modules::sqlite::{db_error, open_database, real, text};
use crate::infrastructure::modules::time::from_apple_time_opt;
use chrono::{DateTime, Utc};
use plist::Value;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::{info, warn};

const TABS_QUERY: &str = "SELECT
        tabs.title,
        tabs.url,
        tabs.user_visible_url,
        tabs.last_viewed_time,
        tab_sessions.session_data
    FROM tabs
    JOIN tab_sessions ON tabs.uuid = tab_sessions.tab_uuid
    ORDER BY tabs.last_viewed_time";

/// Bytes preceding the property list in a session blob
const SESSION_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub entry_title: Option<String>,
    pub entry_url: Option<String>,
    pub data_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserTab {
    pub tab_title: Option<String>,
    pub tab_url: Option<String>,
    pub tab_visible_url: Option<String>,
    pub last_viewed_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub session_data: Vec<SessionEntry>,
}

pub struct SafariBrowserState;

impl Extractor for SafariBrowserState {
    type Record = BrowserTab;

    const NAME: &'static str = "SafariBrowserState";
    const SLUG: &'static str = "safari_browser_state";
    const CHECKS_INDICATORS: bool = true;
    const BACKUP_IDS: &'static [&'static str] = &["3a47b0981ed7c10f3e2800aa66bac96a3b5db28e"];
    const ROOT_PATHS: &'static [&'static str] = &[
        "private/var/mobile/Library/Safari/BrowserState.db",
        "private/var/mobile/Containers/Data/Application/*/Library/Safari/BrowserState.db",
    ];

    fn new(_ctx: &ModuleContext) -> Self {
        SafariBrowserState
    }

    fn run(&self, ctx: &ModuleContext) -> Result<Vec<BrowserTab>, ModuleError> {
        let path = self.locate(ctx)?;
        info!("Found Safari browser state database at path: {}", path.display());

        let conn = open_database(Self::NAME, &path)?;
        let mut stmt = conn.prepare(TABS_QUERY).map_err(db_error(Self::NAME, &path))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    text(row.get(0)?),
                    text(row.get(1)?),
                    text(row.get(2)?),
                    real(row.get(3)?),
                    row.get::<_, Option<Vec<u8>>>(4)?,
                ))
            })
            .map_err(db_error(Self::NAME, &path))?;

        let mut tabs = Vec::new();
        let mut history_count = 0;

        for row in rows {
            let (title, url, visible_url, last_viewed, session) =
                row.map_err(db_error(Self::NAME, &path))?;

            let session_data = match session.as_deref() {
                Some(blob) if !ctx.fast_mode && !blob.is_empty() => {
                    parse_session(blob).unwrap_or_else(|e| {
                        warn!("Cannot parse session data of tab {:?}: {}", url, e);
                        Vec::new()
                    })
                }
                _ => Vec::new(),
            };
            history_count += session_data.len();

            tabs.push(BrowserTab {
                tab_title: title,
                tab_url: url,
                tab_visible_url: visible_url,
                last_viewed_timestamp: from_apple_time_opt(last_viewed),
                session_data,
            });
        }

        info!(
            "Extracted a total of {} tab records and {} session history entries",
            tabs.len(),
            history_count
        );
        Ok(tabs)
    }

    fn serialize(&self, record: &BrowserTab) -> Vec<TimelineEvent> {
        vec![TimelineEvent::new(
            record.last_viewed_timestamp,
            Self::NAME,
            "tab",
            format!(
                "{} - {}",
                record.tab_title.as_deref().unwrap_or_default(),
                record.tab_url.as_deref().unwrap_or_default()
            ),
        )]
    }

    fn check_record(
        &self,
        record: &BrowserTab,
        indicators: &dyn IndicatorSet,
    ) -> Result<Option<IndicatorMatch>, ModuleError> {
        if let Some(hit) = record
            .tab_url
            .as_deref()
            .and_then(|url| indicators.check_domain(url))
        {
            return Ok(Some(hit));
        }

        Ok(record
            .session_data
            .iter()
            .filter_map(|entry| entry.entry_url.as_deref())
            .find_map(|url| indicators.check_domain(url)))
    }
}

/// Decodes the history entries of a tab session blob.
pub fn parse_session(blob: &[u8]) -> Result<Vec<SessionEntry>, plist::Error> {
    let body = blob.get(SESSION_HEADER_LEN..).unwrap_or_default();
    let value = Value::from_reader(Cursor::new(body))?;

    let entries = value
        .as_dictionary()
        .and_then(|root| root.get("SessionHistory"))
        .and_then(Value::as_dictionary)
        .and_then(|history| history.get("SessionHistoryEntries"))
        .and_then(Value::as_array);

    let Some(entries) = entries else {
        return Ok(Vec::new());
    };

    Ok(entries
        .iter()
        .filter_map(Value::as_dictionary)
        .map(|entry| SessionEntry {
            entry_title: entry
                .get("SessionHistoryEntryOriginalURL")
                .and_then(Value::as_string)
                .map(str::to_string),
            entry_url: entry
                .get("SessionHistoryEntryURL")
                .and_then(Value::as_string)
                .map(str::to_string),
            data_length: entry
                .get("SessionHistoryEntryData")
                .and_then(Value::as_data)
                .map_or(0, <[u8]>::len),
        })
        .collect())
}
