//! Manifest database
//!
//! `Manifest.db` is a SQLite file whose `Files` table indexes every file in
//! the backup. The `file` column holds an archived property list with the
//! file's metadata and, in encrypted backups, its wrapped key.

use crate::domain::entities::{EntryKind, ManifestEntry, ProtectionClass};
use plist::Value;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const FILES_QUERY: &str = "SELECT fileID, domain, relativePath, flags, file FROM Files";

#[derive(Error, Debug)]
pub enum ManifestDbError {
    #[error("Cannot query {path}: {source}")]
    Sqlite {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Invalid file metadata: {0}")]
    Metadata(String),
}

/// Metadata decoded from one archived file record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub protection_class: Option<ProtectionClass>,
    pub size: Option<u64>,
    pub mode: Option<u64>,
    /// Unix seconds
    pub birth: Option<i64>,
    pub last_modified: Option<i64>,
    pub last_status_change: Option<i64>,
    /// Class-prefixed wrapped key
    pub encryption_key: Option<Vec<u8>>,
}

impl FileMetadata {
    /// Decodes a keyed-archive property list.
    pub fn from_archive(blob: &[u8]) -> Result<Self, ManifestDbError> {
        let value = Value::from_reader(Cursor::new(blob))
            .map_err(|e| ManifestDbError::Metadata(e.to_string()))?;
        let archive = Archive::new(&value)?;
        let root = archive.root()?;

        let int = |key: &str| root.get(key).and_then(Value::as_signed_integer);
        let uint = |key: &str| root.get(key).and_then(Value::as_unsigned_integer);

        let encryption_key = match root.get("EncryptionKey") {
            Some(Value::Data(data)) => Some(data.clone()),
            Some(reference) => archive
                .resolve(reference)
                .and_then(Value::as_dictionary)
                .and_then(|dict| dict.get("NS.data"))
                .and_then(Value::as_data)
                .map(<[u8]>::to_vec),
            None => None,
        };

        Ok(Self {
            protection_class: uint("ProtectionClass").map(|c| c as ProtectionClass),
            size: uint("Size"),
            mode: uint("Mode"),
            birth: int("Birth"),
            last_modified: int("LastModified"),
            last_status_change: int("LastStatusChange"),
            encryption_key,
        })
    }
}

/// Object table of a keyed archive
struct Archive<'a> {
    objects: &'a [Value],
    top: &'a Value,
}

impl<'a> Archive<'a> {
    fn new(value: &'a Value) -> Result<Self, ManifestDbError> {
        let dict = value
            .as_dictionary()
            .ok_or_else(|| ManifestDbError::Metadata("archive is not a dictionary".into()))?;
        let objects = dict
            .get("$objects")
            .and_then(Value::as_array)
            .ok_or_else(|| ManifestDbError::Metadata("missing $objects".into()))?;
        let top = dict
            .get("$top")
            .and_then(Value::as_dictionary)
            .and_then(|top| top.get("root"))
            .ok_or_else(|| ManifestDbError::Metadata("missing $top.root".into()))?;
        Ok(Self { objects, top })
    }

    fn resolve(&self, reference: &'a Value) -> Option<&'a Value> {
        match reference {
            Value::Uid(uid) => self.objects.get(uid.get() as usize),
            other => Some(other),
        }
    }

    fn root(&self) -> Result<&'a plist::Dictionary, ManifestDbError> {
        self.resolve(self.top)
            .and_then(Value::as_dictionary)
            .ok_or_else(|| ManifestDbError::Metadata("root object is not a dictionary".into()))
    }
}

/// One row of the `Files` table
#[derive(Debug, Clone)]
pub struct ManifestFile {
    pub entry: ManifestEntry,
    pub metadata: FileMetadata,
}

/// Reads every row of a plaintext `Manifest.db`.
///
/// Rows whose archived metadata cannot be decoded are kept, with empty
/// metadata.
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestFile>, ManifestDbError> {
    let sqlite_err = |source| ManifestDbError::Sqlite {
        path: path.to_path_buf(),
        source,
    };

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(sqlite_err)?;
    let mut stmt = conn.prepare(FILES_QUERY).map_err(sqlite_err)?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, Option<Vec<u8>>>(4)?,
            ))
        })
        .map_err(sqlite_err)?;

    let mut files = Vec::new();
    for row in rows {
        let (file_id, domain, relative_path, flags, blob) = row.map_err(sqlite_err)?;

        let metadata = match blob.as_deref().map(FileMetadata::from_archive) {
            Some(Ok(metadata)) => metadata,
            Some(Err(e)) => {
                warn!("Cannot decode metadata of {}: {}", file_id, e);
                FileMetadata::default()
            }
            None => FileMetadata::default(),
        };

        let entry = ManifestEntry {
            file_id,
            domain: domain.unwrap_or_default(),
            relative_path: relative_path.unwrap_or_default(),
            kind: EntryKind::from(flags.unwrap_or(0)),
            protection_class: metadata.protection_class,
            encryption_key: metadata.encryption_key.clone(),
            size: metadata.size,
        };
        files.push(ManifestFile { entry, metadata });
    }

    debug!("Read {} manifest entries from {}", files.len(), path.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::{Dictionary, Uid};

    fn archive(root: Dictionary, key: Option<Vec<u8>>) -> Vec<u8> {
        let mut root = root;
        let mut objects = vec![Value::String("$null".into())];
        if let Some(key) = key {
            let mut data = Dictionary::new();
            data.insert("NS.data".into(), Value::Data(key));
            objects.push(Value::Dictionary(data));
            root.insert("EncryptionKey".into(), Value::Uid(Uid::new(1)));
        }
        objects.push(Value::Dictionary(root));
        let root_uid = objects.len() as u64 - 1;

        let mut top = Dictionary::new();
        top.insert("root".into(), Value::Uid(Uid::new(root_uid)));
        let mut archive = Dictionary::new();
        archive.insert("$archiver".into(), Value::String("NSKeyedArchiver".into()));
        archive.insert("$objects".into(), Value::Array(objects));
        archive.insert("$top".into(), Value::Dictionary(top));

        let mut out = Vec::new();
        Value::Dictionary(archive).to_writer_binary(&mut out).unwrap();
        out
    }

    #[test]
    fn test_decodes_archived_metadata() {
        let mut root = Dictionary::new();
        root.insert("ProtectionClass".into(), Value::Integer(3u64.into()));
        root.insert("Size".into(), Value::Integer(42u64.into()));
        root.insert("LastModified".into(), Value::Integer(1_600_000_000i64.into()));

        let meta = FileMetadata::from_archive(&archive(root, Some(vec![3, 0, 0, 0, 7]))).unwrap();
        assert_eq!(meta.protection_class, Some(3));
        assert_eq!(meta.size, Some(42));
        assert_eq!(meta.last_modified, Some(1_600_000_000));
        assert_eq!(meta.birth, None);
        assert_eq!(meta.encryption_key, Some(vec![3, 0, 0, 0, 7]));
    }

    #[test]
    fn test_rejects_non_archive() {
        assert!(FileMetadata::from_archive(b"not a plist").is_err());
    }

    #[test]
    fn test_reads_files_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Manifest.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE Files (fileID TEXT PRIMARY KEY, domain TEXT, relativePath TEXT, flags INTEGER, file BLOB);",
        )
        .unwrap();
        let mut root = Dictionary::new();
        root.insert("Size".into(), Value::Integer(5u64.into()));
        conn.execute(
            "INSERT INTO Files VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params!["abcd", "HomeDomain", "Library/a", 1, archive(root, None)],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO Files VALUES ('ef01', 'HomeDomain', 'Library', 2, X'00')",
            [],
        )
        .unwrap();
        drop(conn);

        let files = read_manifest(&path).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].entry.size, Some(5));
        assert!(files[0].entry.is_file());
        assert_eq!(files[1].entry.kind, EntryKind::Directory);
        assert_eq!(files[1].metadata, FileMetadata::default());
    }
}
