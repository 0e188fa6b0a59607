//! Shared fixtures
//!
//! Builds encrypted backups, filesystem dumps and indicator bundles on disk.

#![allow(dead_code)]

use ios_triage::domain::entities::{
    encode_tlv, encode_tlv_u32, file_id, Keybag, SymmetricKey, WRAP_PASSCODE,
};
use ios_triage::infrastructure::crypto::cbc::encrypt_cbc;
use ios_triage::infrastructure::crypto::kdf::derive_secret;
use ios_triage::infrastructure::crypto::key_wrap;
use plist::{Dictionary, Uid, Value};
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PASSWORD: &str = "correct horse battery staple";

/// Protection class used for backup files
pub const FILE_CLASS: u32 = 3;
/// Protection class of `Manifest.db`
pub const MANIFEST_CLASS: u32 = 4;

const CLASSES: [u32; 4] = [1, 2, 3, 4];

pub const SAFARI_DB: &str = "private/var/mobile/Library/Safari/BrowserState.db";
pub const INTERACTION_DB: &str = "private/var/mobile/Library/CoreDuet/People/interactionC.db";

/// Seconds from the Unix epoch to 2001-01-01
pub const APPLE_EPOCH: f64 = 978_307_200.0;

// ============================================================================
// Keybag
// ============================================================================

fn class_key(class: u32) -> SymmetricKey {
    SymmetricKey::new([0x40 + class as u8; 32])
}

fn keybag_header() -> Vec<u8> {
    let mut out = Vec::new();
    encode_tlv_u32(&mut out, b"VERS", 3);
    encode_tlv_u32(&mut out, b"TYPE", 1);
    encode_tlv(&mut out, b"UUID", &[0x11; 16]);
    encode_tlv(&mut out, b"HMCK", &[0x22; 40]);
    encode_tlv_u32(&mut out, b"WRAP", 0);
    encode_tlv(&mut out, b"SALT", &[0x33; 20]);
    encode_tlv_u32(&mut out, b"ITER", 10);
    encode_tlv_u32(&mut out, b"DPWT", 1);
    encode_tlv_u32(&mut out, b"DPIC", 10);
    encode_tlv(&mut out, b"DPSL", &[0x44; 20]);
    out
}

/// Serialized keybag whose class keys are wrapped under the secret derived
/// from `password`, along with that secret
pub fn build_keybag(password: &str) -> (Vec<u8>, SymmetricKey) {
    let header = keybag_header();
    let parsed = Keybag::parse(&header).unwrap();
    let secret = derive_secret(&parsed, password.as_bytes()).unwrap();

    let mut out = header;
    for class in CLASSES {
        let wrapped = key_wrap::wrap(&secret, class_key(class).as_bytes()).unwrap();
        encode_tlv(&mut out, b"UUID", &[class as u8; 16]);
        encode_tlv_u32(&mut out, b"CLAS", class);
        encode_tlv_u32(&mut out, b"WRAP", WRAP_PASSCODE);
        encode_tlv_u32(&mut out, b"KTYP", 0);
        encode_tlv(&mut out, b"WPKY", &wrapped);
    }
    (out, secret)
}

/// Class-prefixed wrapped key, the layout of `EncryptionKey` and `ManifestKey`
fn wrapped_key_blob(class: u32, key: &SymmetricKey) -> Vec<u8> {
    let mut blob = class.to_le_bytes().to_vec();
    blob.extend(key_wrap::wrap(&class_key(class), key.as_bytes()).unwrap());
    blob
}

// ============================================================================
// Manifest
// ============================================================================

/// NSKeyedArchiver-style metadata blob of a `Files` row
pub fn archived_metadata(size: u64, protection_class: u32, key: Option<Vec<u8>>) -> Vec<u8> {
    let mut root = Dictionary::new();
    root.insert("Size".into(), Value::Integer(size.into()));
    root.insert("ProtectionClass".into(), Value::Integer(u64::from(protection_class).into()));
    root.insert("Mode".into(), Value::Integer(0o100644u64.into()));
    root.insert("Birth".into(), Value::Integer(1_600_000_000i64.into()));
    root.insert("LastModified".into(), Value::Integer(1_600_000_100i64.into()));
    root.insert("LastStatusChange".into(), Value::Integer(1_600_000_200i64.into()));

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

fn create_files_table(conn: &Connection) {
    conn.execute_batch(
        "CREATE TABLE Files (fileID TEXT PRIMARY KEY, domain TEXT, relativePath TEXT, flags INTEGER, file BLOB);",
    )
    .unwrap();
}

// ============================================================================
// Encrypted backup
// ============================================================================

/// A backup file: domain, relative path, plaintext
pub struct BackupFile {
    pub domain: &'static str,
    pub relative_path: &'static str,
    pub content: Vec<u8>,
}

impl BackupFile {
    pub fn new(domain: &'static str, relative_path: &'static str, content: &[u8]) -> Self {
        Self {
            domain,
            relative_path,
            content: content.to_vec(),
        }
    }

    pub fn file_id(&self) -> String {
        file_id(self.domain, self.relative_path)
    }
}

pub struct EncryptedBackup {
    pub dir: TempDir,
    pub secret: SymmetricKey,
    pub files: Vec<BackupFile>,
}

impl EncryptedBackup {
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("backup")
    }

    /// Writes the raw secret to a file next to the backup
    pub fn key_file(&self) -> PathBuf {
        let path = self.dir.path().join("backup.key");
        fs::write(&path, self.secret.as_bytes()).unwrap();
        path
    }
}

pub fn default_files() -> Vec<BackupFile> {
    vec![
        BackupFile::new("HomeDomain", "Library/Preferences/com.example.plist", b"preferences"),
        BackupFile::new("AppDomain-com.example.app", "Documents/notes.txt", &[0xAB; 100]),
        BackupFile::new("MediaDomain", "Media/empty", b""),
        BackupFile::new("HomeDomain", "Library/aligned.bin", &[7u8; 32]),
    ]
}

fn manifest_key() -> SymmetricKey {
    SymmetricKey::new([0x99; 32])
}

/// Builds an encrypted backup holding `files`, every file under its own key
pub fn encrypted_backup(files: Vec<BackupFile>) -> EncryptedBackup {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("backup");
    fs::create_dir_all(&root).unwrap();

    let (keybag, secret) = build_keybag(PASSWORD);

    let plain_manifest = dir.path().join("plain_manifest.db");
    let conn = Connection::open(&plain_manifest).unwrap();
    create_files_table(&conn);
    conn.execute(
        "INSERT INTO Files VALUES (?1, ?2, ?3, 2, X'00')",
        params![file_id("HomeDomain", "Library"), "HomeDomain", "Library"],
    )
    .unwrap();

    for (index, file) in files.iter().enumerate() {
        let key = SymmetricKey::new([0x80 + index as u8; 32]);
        let blob = wrapped_key_blob(FILE_CLASS, &key);
        let metadata = archived_metadata(file.content.len() as u64, FILE_CLASS, Some(blob));
        conn.execute(
            "INSERT INTO Files VALUES (?1, ?2, ?3, 1, ?4)",
            params![file.file_id(), file.domain, file.relative_path, metadata],
        )
        .unwrap();

        let target = root.join(&file.file_id()[..2]).join(file.file_id());
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, encrypt_cbc(&key, &file.content)).unwrap();
    }
    drop(conn);

    let manifest_key = manifest_key();
    let plain = fs::read(&plain_manifest).unwrap();
    fs::write(root.join("Manifest.db"), encrypt_cbc(&manifest_key, &plain)).unwrap();

    let mut manifest = Dictionary::new();
    manifest.insert("BackupKeyBag".into(), Value::Data(keybag));
    manifest.insert(
        "ManifestKey".into(),
        Value::Data(wrapped_key_blob(MANIFEST_CLASS, &manifest_key)),
    );
    manifest.insert("IsEncrypted".into(), Value::Boolean(true));
    manifest.insert("Version".into(), Value::String("10.0".into()));
    Value::Dictionary(manifest)
        .to_file_binary(root.join("Manifest.plist"))
        .unwrap();

    let mut info = Dictionary::new();
    info.insert("Device Name".into(), Value::String("iPhone".into()));
    Value::Dictionary(info).to_file_xml(root.join("Info.plist")).unwrap();

    EncryptedBackup { dir, secret, files }
}

/// Points the manifest row `old_id` at `new_id` and re-encrypts `Manifest.db`
pub fn retarget_file_id(backup: &EncryptedBackup, old_id: &str, new_id: &str) {
    let plain_manifest = backup.dir.path().join("plain_manifest.db");
    let conn = Connection::open(&plain_manifest).unwrap();
    conn.execute(
        "UPDATE Files SET fileID = ?1 WHERE fileID = ?2",
        params![new_id, old_id],
    )
    .unwrap();
    drop(conn);

    let plain = fs::read(&plain_manifest).unwrap();
    fs::write(
        backup.root().join("Manifest.db"),
        encrypt_cbc(&manifest_key(), &plain),
    )
    .unwrap();
}

// ============================================================================
// Filesystem dump
// ============================================================================

/// Writes a `BrowserState.db` with one tab per `(title, url, viewed)` row.
/// `viewed` is Apple absolute time.
pub fn write_browser_state(path: &Path, tabs: &[(&str, &str, f64)]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE tabs (id INTEGER PRIMARY KEY, uuid TEXT, title TEXT, url TEXT, user_visible_url TEXT, last_viewed_time REAL);
         CREATE TABLE tab_sessions (id INTEGER PRIMARY KEY, tab_uuid TEXT, session_data BLOB);",
    )
    .unwrap();

    for (index, (title, url, viewed)) in tabs.iter().enumerate() {
        let uuid = format!("tab-{index}");
        conn.execute(
            "INSERT INTO tabs (uuid, title, url, user_visible_url, last_viewed_time) VALUES (?1, ?2, ?3, ?3, ?4)",
            params![uuid, title, url, viewed],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO tab_sessions (tab_uuid, session_data) VALUES (?1, ?2)",
            params![uuid, session_blob(&[url])],
        )
        .unwrap();
    }
}

/// Session blob: 4 header bytes, then a binary property list
pub fn session_blob(urls: &[&str]) -> Vec<u8> {
    let entries = urls
        .iter()
        .map(|url| {
            let mut entry = Dictionary::new();
            entry.insert("SessionHistoryEntryTitle".into(), Value::String("page".into()));
            entry.insert("SessionHistoryEntryURL".into(), Value::String(url.to_string()));
            entry.insert("SessionHistoryEntryData".into(), Value::Data(vec![1, 2, 3, 4]));
            Value::Dictionary(entry)
        })
        .collect();
    let mut history = Dictionary::new();
    history.insert("SessionHistoryEntries".into(), Value::Array(entries));
    let mut root = Dictionary::new();
    root.insert("SessionHistory".into(), Value::Dictionary(history));

    let mut blob = vec![0, 0, 0, 1];
    Value::Dictionary(root).to_writer_binary(&mut blob).unwrap();
    blob
}

/// Writes an `interactionC.db` with one message interaction.
/// Dates are Apple absolute time; zero stands for unset.
pub fn write_interaction_db(path: &Path, start: f64, end: f64, created: f64) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE ZINTERACTIONS (Z_PK INTEGER PRIMARY KEY, ZSTARTDATE REAL, ZENDDATE REAL,
            ZBUNDLEID TEXT, ZACCOUNT TEXT, ZTARGETBUNDLEID TEXT, ZDIRECTION INTEGER, ZSENDER INTEGER,
            ZRECIPIENTCOUNT INTEGER, ZDOMAINIDENTIFIER TEXT, ZISRESPONSE INTEGER, ZCREATIONDATE REAL,
            ZCONTENTURL TEXT, ZLOCATIONUUID TEXT, ZGROUPNAME TEXT, ZDERIVEDINTENTIDENTIFIER TEXT);
         CREATE TABLE ZCONTACTS (Z_PK INTEGER PRIMARY KEY, ZDISPLAYNAME TEXT, ZIDENTIFIER TEXT,
            ZPERSONID TEXT, ZINCOMINGRECIPIENTCOUNT INTEGER, ZINCOMINGSENDERCOUNT INTEGER,
            ZOUTGOINGRECIPIENTCOUNT INTEGER, ZCREATIONDATE REAL, ZFIRSTINCOMINGRECIPIENTDATE REAL,
            ZFIRSTINCOMINGSENDERDATE REAL, ZFIRSTOUTGOINGRECIPIENTDATE REAL,
            ZLASTINCOMINGSENDERDATE REAL, ZLASTINCOMINGRECIPIENTDATE REAL,
            ZLASTOUTGOINGRECIPIENTDATE REAL, ZCUSTOMIDENTIFIER TEXT);
         CREATE TABLE ZATTACHMENT (Z_PK INTEGER PRIMARY KEY, ZCONTENTTEXT TEXT, ZUTI TEXT,
            ZCONTENTURL TEXT, ZSIZEINBYTES INTEGER, ZPHOTOLOCALIDENTIFIER TEXT, ZIDENTIFIER BLOB,
            ZCLOUDIDENTIFIER TEXT);
         CREATE TABLE Z_1INTERACTIONS (Z_1ATTACHMENTS INTEGER, Z_3INTERACTIONS INTEGER);
         CREATE TABLE Z_2INTERACTIONRECIPIENT (Z_2RECIPIENTS INTEGER, Z_3INTERACTIONRECIPIENT INTEGER);
         INSERT INTO ZCONTACTS (Z_PK, ZDISPLAYNAME, ZIDENTIFIER) VALUES (1, 'Alice', '+15550100');",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO ZINTERACTIONS (Z_PK, ZSTARTDATE, ZENDDATE, ZBUNDLEID, ZACCOUNT, ZDIRECTION, ZSENDER, ZCREATIONDATE)
         VALUES (1, ?1, ?2, 'com.apple.MobileSMS', 'me@example.com', 0, 1, ?3)",
        params![start, end, created],
    )
    .unwrap();
}

/// Adds an index entry whose SQL does not parse, which makes SQLite report
/// the whole database as malformed while every table stays intact
pub fn damage_schema(path: &Path, table: &str) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch("PRAGMA writable_schema = ON;").unwrap();
    conn.execute(
        "INSERT INTO sqlite_master (type, name, tbl_name, rootpage, sql)
         VALUES ('index', 'broken', ?1, 0, 'CREATE INDEX broken ON')",
        params![table],
    )
    .unwrap();
    conn.execute_batch("PRAGMA writable_schema = OFF;").unwrap();
}

/// Filesystem dump with two Safari tabs and one interaction carrying three
/// distinct timestamps
pub fn filesystem_dump() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_browser_state(
        &dir.path().join(SAFARI_DB),
        &[
            ("News", "https://news.example.org/today", 650_000_000.0),
            ("Login", "https://login.evil.example/x", 650_000_100.0),
        ],
    );
    write_interaction_db(
        &dir.path().join(INTERACTION_DB),
        650_000_200.0,
        650_000_300.0,
        650_000_400.0,
    );
    dir
}

// ============================================================================
// Indicators
// ============================================================================

pub fn stix_bundle(patterns: &[&str]) -> String {
    let mut objects = vec![serde_json::json!({
        "type": "malware",
        "id": "malware--1",
        "name": "TestSpyware"
    })];
    for (index, pattern) in patterns.iter().enumerate() {
        objects.push(serde_json::json!({
            "type": "indicator",
            "id": format!("indicator--{index}"),
            "pattern": pattern,
            "pattern_type": "stix"
        }));
    }
    serde_json::json!({ "type": "bundle", "id": "bundle--1", "objects": objects }).to_string()
}

/// Writes a bundle flagging `evil.example` and returns its path
pub fn write_stix_file(dir: &Path) -> PathBuf {
    let path = dir.join("test.stix2");
    fs::write(&path, stix_bundle(&["[domain-name:value = 'evil.example']"])).unwrap();
    path
}
