//! Persistence of module results and timelines

mod json_store;
mod timeline_csv;

pub use json_store::{list_snapshots, read_snapshot, LocalResultStore};
pub use timeline_csv::{write_timeline, TIMELINE_HEADER};
