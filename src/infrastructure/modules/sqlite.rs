//! SQLite helpers shared by the artifact modules

use crate::domain::repositories::ModuleError;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SCHEMA_QUERY: &str = "SELECT type, name, sql FROM sqlite_master ORDER BY rowid";

fn open_read_only(path: &Path) -> rusqlite::Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

fn is_malformed(e: &rusqlite::Error) -> bool {
    e.to_string().contains("malformed")
}

/// Opens an artifact database read-only and checks that its schema can be
/// read.
///
/// A malformed database is cloned into memory, table by table, and the
/// clone is returned instead. The file on disk is never written.
pub fn open_database(module: &'static str, path: &Path) -> Result<Connection, ModuleError> {
    let conn = open_read_only(path).map_err(db_error(module, path))?;

    let schema_check = conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    });
    let e = match schema_check {
        Ok(_) => return Ok(conn),
        Err(e) => e,
    };
    if !is_malformed(&e) {
        return Err(db_error(module, path)(e));
    }
    drop(conn);

    info!("Database at path {} is malformed. Trying to recover...", path.display());
    match recover_database(path) {
        Ok(clone) => {
            info!("Database at path {} recovered successfully!", path.display());
            Ok(clone)
        }
        Err(recovery) => Err(ModuleError::Malformed {
            module,
            path: path.to_path_buf(),
            message: format!("{e}; recovery failed: {recovery}"),
        }),
    }
}

/// Copies the schema and every readable row of a damaged database into an
/// in-memory database. Objects that cannot be recreated are skipped, and a
/// table that fails mid-scan keeps the rows read so far.
pub fn recover_database(path: &Path) -> rusqlite::Result<Connection> {
    let damaged = open_read_only(path)?;
    damaged.execute_batch("PRAGMA writable_schema = ON")?;

    let schema: Vec<(Option<String>, Option<String>, Option<String>)> = {
        let mut stmt = damaged.prepare(SCHEMA_QUERY)?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let clone = Connection::open_in_memory()?;
    let mut deferred = Vec::new();

    for (kind, name, sql) in schema {
        let (Some(kind), Some(name), Some(sql)) = (kind, name, sql) else {
            continue;
        };
        if kind != "table" {
            deferred.push((name, sql));
            continue;
        }
        if name.starts_with("sqlite_") {
            continue;
        }
        if let Err(e) = clone.execute_batch(&sql) {
            debug!("Cannot recreate table {}: {}", name, e);
            continue;
        }
        match copy_rows(&damaged, &clone, &name) {
            Ok(count) => debug!("Recovered {} rows of {}", count, name),
            Err(e) => warn!("Could not recover every row of {}: {}", name, e),
        }
    }

    for (name, sql) in deferred {
        if let Err(e) = clone.execute_batch(&sql) {
            debug!("Cannot recreate {}: {}", name, e);
        }
    }

    Ok(clone)
}

fn copy_rows(from: &Connection, to: &Connection, table: &str) -> rusqlite::Result<usize> {
    let quoted = format!("\"{}\"", table.replace('"', "\"\""));
    let mut select = from.prepare(&format!("SELECT * FROM {quoted}"))?;
    let columns = select.column_count();
    let placeholders = vec!["?"; columns].join(", ");
    let mut insert = to.prepare(&format!("INSERT INTO {quoted} VALUES ({placeholders})"))?;

    let mut rows = select.query([])?;
    let mut copied = 0;
    while let Some(row) = rows.next()? {
        let values = (0..columns)
            .map(|i| row.get::<_, Value>(i))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        insert.execute(params_from_iter(values))?;
        copied += 1;
    }
    Ok(copied)
}

/// Maps a SQLite error to a module error for `path`
pub fn db_error(module: &'static str, path: &Path) -> impl Fn(rusqlite::Error) -> ModuleError {
    let path: PathBuf = path.to_path_buf();
    move |e| ModuleError::Database {
        module,
        path: path.clone(),
        message: e.to_string(),
    }
}

/// Column value as text, whatever its storage class
pub fn text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

/// Column value as an integer, when it holds one
pub fn integer(value: Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(i),
        Value::Real(f) => Some(f as i64),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Column value as a float, when it holds a number
pub fn real(value: Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(i as f64),
        Value::Real(f) => Some(f),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}
