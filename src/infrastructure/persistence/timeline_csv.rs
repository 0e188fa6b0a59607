//! Timeline CSV output

use crate::domain::entities::TimelineEvent;
use crate::domain::repositories::PersistenceError;
use csv::{QuoteStyle, WriterBuilder};
use std::path::Path;

pub const TIMELINE_HEADER: [&str; 4] = ["UTC Timestamp", "Plugin", "Event", "Description"];

/// Writes events in order, every field quoted.
pub fn write_timeline(path: &Path, events: &[TimelineEvent]) -> Result<(), PersistenceError> {
    let csv_err = |source| PersistenceError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_path(path)
        .map_err(csv_err)?;

    writer.write_record(TIMELINE_HEADER).map_err(csv_err)?;
    for event in events {
        writer
            .write_record([
                event.timestamp_string().as_str(),
                event.module.as_str(),
                event.event.as_str(),
                event.data.as_str(),
            ])
            .map_err(csv_err)?;
    }

    writer.flush().map_err(|source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::fs;

    #[test]
    fn test_writes_quoted_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeline.csv");
        let ts = Utc.with_ymd_and_hms(2021, 7, 1, 0, 0, 0).unwrap();
        let events = vec![
            TimelineEvent::new(None, "Manifest", "file", "a \"quoted\" path"),
            TimelineEvent::new(Some(ts), "SafariBrowserState", "tab", "t - u"),
        ];

        write_timeline(&path, &events).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], r#""UTC Timestamp","Plugin","Event","Description""#);
        assert_eq!(lines[1], r#""","Manifest","file","a ""quoted"" path""#);
        assert_eq!(
            lines[2],
            r#""2021-07-01 00:00:00.000000","SafariBrowserState","tab","t - u""#
        );
    }
}
