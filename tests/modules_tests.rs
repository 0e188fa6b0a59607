//! Extraction module tests
//!
//! Built-in modules against on-disk fixtures, snapshot restore, and the
//! decrypt-then-check flow over a backup.

mod common;

use common::*;
use ios_triage::application::dto::{ModuleStatus, RunOptions};
use ios_triage::application::{BackupDecryptionEngine, ExecutionDriver};
use ios_triage::domain::entities::{file_id, storage_path};
use ios_triage::domain::repositories::{
    Extractor, IndicatorOutcome, Module, ModuleContext, RunOutcome, SourceKind,
};
use ios_triage::domain::services::{ModuleRunner, SourceModes};
use ios_triage::infrastructure::indicators::StixIndicators;
use ios_triage::infrastructure::modules::{
    builtin_registry, InteractionC, Manifest, SafariBrowserState,
};
use rstest::*;
use std::fs;
use tempfile::TempDir;

fn fs_context(root: &std::path::Path, name: &'static str) -> ModuleContext {
    ModuleContext::new(name, root, SourceKind::FileSystem)
}

// ============================================================================
// SafariBrowserState
// ============================================================================

#[test]
fn test_safari_reads_tabs_and_sessions() {
    let dump = filesystem_dump();
    let ctx = fs_context(dump.path(), SafariBrowserState::NAME);

    let tabs = SafariBrowserState.run(&ctx).unwrap();
    assert_eq!(tabs.len(), 2);
    assert_eq!(tabs[0].tab_title.as_deref(), Some("News"));
    assert_eq!(tabs[0].session_data.len(), 1);
    assert_eq!(tabs[0].session_data[0].data_length, 4);
    assert_eq!(
        tabs[1].last_viewed_timestamp.unwrap().timestamp(),
        (650_000_100.0 + APPLE_EPOCH) as i64
    );
}

#[test]
fn test_safari_found_under_app_container() {
    let dump = TempDir::new().unwrap();
    write_browser_state(
        &dump
            .path()
            .join("private/var/mobile/Containers/Data/Application/ABCD/Library/Safari/BrowserState.db"),
        &[("A", "https://a.example/", 1.0)],
    );
    let ctx = fs_context(dump.path(), SafariBrowserState::NAME);
    assert_eq!(SafariBrowserState.run(&ctx).unwrap().len(), 1);
}

#[test]
fn test_safari_reads_recovered_database() {
    let dump = filesystem_dump();
    damage_schema(&dump.path().join(SAFARI_DB), "tabs");
    let ctx = fs_context(dump.path(), SafariBrowserState::NAME);

    let tabs = SafariBrowserState.run(&ctx).unwrap();
    assert_eq!(tabs.len(), 2);
    assert_eq!(tabs[1].tab_url.as_deref(), Some("https://login.evil.example/x"));
    assert_eq!(tabs[1].session_data.len(), 1);
}

#[test]
fn test_safari_session_url_detection() {
    let mut iocs = StixIndicators::new();
    iocs.add_bundle(&stix_bundle(&["[domain-name:value = 'news.example.org']"]), "t")
        .unwrap();
    let dump = filesystem_dump();

    let mut runner = ModuleRunner::<SafariBrowserState>::new(fs_context(dump.path(), SafariBrowserState::NAME));
    runner.run().unwrap();
    runner.check_indicators(&iocs).unwrap();
    assert_eq!(runner.detected().len(), 1);
    assert_eq!(runner.detected()[0].tab_title.as_deref(), Some("News"));
}

// ============================================================================
// InteractionC
// ============================================================================

#[test]
fn test_interaction_c_reads_join() {
    let dump = filesystem_dump();
    let ctx = fs_context(dump.path(), InteractionC::NAME);

    let rows = InteractionC.run(&ctx).unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.bundle_id.as_deref(), Some("com.apple.MobileSMS"));
    assert_eq!(row.sender_display_name.as_deref(), Some("Alice"));
    assert_eq!(row.recipient_display_name, None);
    assert_eq!(row.attachment_id, None);
    assert_eq!(row.contacts_creation_date, None);
    assert_eq!(InteractionC.serialize(row).len(), 3);
}

#[test]
fn test_interaction_c_zero_dates_are_unset() {
    let dump = TempDir::new().unwrap();
    write_interaction_db(&dump.path().join(INTERACTION_DB), 650_000_000.0, 0.0, 650_000_000.0);
    let ctx = fs_context(dump.path(), InteractionC::NAME);

    let rows = InteractionC.run(&ctx).unwrap();
    assert_eq!(rows[0].end_date, None);
    let events = InteractionC.serialize(&rows[0]);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "start_date");
}

#[test]
fn test_interaction_c_found_by_backup_id() {
    let backup = TempDir::new().unwrap();
    let id = "1f5a521220a3ad80ebfdc196978df8e7a2e49dee";
    write_interaction_db(&storage_path(backup.path(), id), 650_000_000.0, 650_000_060.0, 0.0);

    let registry = builtin_registry().unwrap();
    let descriptor = registry.find_by_slug("interaction_c").unwrap();
    assert_eq!(descriptor.modes, SourceModes::ALL);

    let ctx = ModuleContext::new(InteractionC::NAME, backup.path(), SourceKind::Backup);
    assert_eq!(InteractionC.locate(&ctx).unwrap(), storage_path(backup.path(), id));
    assert_eq!(InteractionC.run(&ctx).unwrap().len(), 1);
}

// ============================================================================
// Snapshots
// ============================================================================

#[test]
fn test_restored_module_matches_original() {
    let dump = filesystem_dump();
    let registry = builtin_registry().unwrap();

    for slug in ["safari_browser_state", "interaction_c"] {
        let descriptor = registry.find_by_slug(slug).unwrap();
        let mut original = descriptor.build(fs_context(dump.path(), descriptor.name));
        assert!(matches!(original.run().unwrap(), RunOutcome::Ran { .. }));

        let restored = descriptor.restore(original.snapshot().unwrap()).unwrap();
        assert_eq!(restored.result_count(), original.result_count(), "{slug}");
        assert_eq!(restored.timeline(), original.timeline(), "{slug}");
    }
}

/// Runs, checks and snapshots one module, then checks a restored copy
/// against the same indicators and compares both detections.
fn assert_recheck_matches_live(
    mut live: Box<dyn Module>,
    registry_slug: &str,
    iocs: &StixIndicators,
) -> IndicatorOutcome {
    let registry = builtin_registry().unwrap();
    let descriptor = registry.find_by_slug(registry_slug).unwrap();

    assert!(matches!(live.run().unwrap(), RunOutcome::Ran { .. }));
    let live_outcome = live.check_indicators(iocs).unwrap();

    let mut restored = descriptor.restore(live.snapshot().unwrap()).unwrap();
    let restored_outcome = restored.check_indicators(iocs).unwrap();

    assert_eq!(restored_outcome, live_outcome, "{registry_slug}");
    assert_eq!(
        restored.detected_snapshot().unwrap(),
        live.detected_snapshot().unwrap(),
        "{registry_slug}"
    );
    assert_eq!(restored.timeline_detected(), live.timeline_detected(), "{registry_slug}");
    live_outcome
}

#[test]
fn test_recheck_of_filesystem_snapshot_matches_live() {
    let dump = filesystem_dump();
    let registry = builtin_registry().unwrap();
    let mut iocs = StixIndicators::new();
    iocs.add_bundle(&stix_bundle(&["[domain-name:value = 'evil.example']"]), "t")
        .unwrap();

    let safari = registry.find_by_slug("safari_browser_state").unwrap();
    let outcome = assert_recheck_matches_live(
        safari.build(fs_context(dump.path(), safari.name)),
        safari.slug,
        &iocs,
    );
    assert_eq!(outcome, IndicatorOutcome::Checked { detected: 1 });

    let interaction = registry.find_by_slug("interaction_c").unwrap();
    let outcome = assert_recheck_matches_live(
        interaction.build(fs_context(dump.path(), interaction.name)),
        interaction.slug,
        &iocs,
    );
    assert_eq!(outcome, IndicatorOutcome::NotSupported);
}

#[test]
fn test_restore_rejects_wrong_shape() {
    let registry = builtin_registry().unwrap();
    let descriptor = registry.find_by_slug("safari_browser_state").unwrap();
    assert!(descriptor.restore(serde_json::json!({"not": "an array"})).is_err());
}

// ============================================================================
// Decrypt, then check the backup
// ============================================================================

#[fixture]
fn backup_with_safari() -> EncryptedBackup {
    let scratch = TempDir::new().unwrap();
    let db = scratch.path().join("BrowserState.db");
    write_browser_state(&db, &[("Bad", "https://cdn.evil.example/p", 650_000_000.0)]);

    let mut files = default_files();
    files.push(BackupFile::new(
        "HomeDomain",
        "Library/Safari/BrowserState.db",
        &fs::read(&db).unwrap(),
    ));
    encrypted_backup(files)
}

#[test]
fn test_safari_backup_id_matches_domain_path() {
    assert_eq!(
        file_id("HomeDomain", "Library/Safari/BrowserState.db"),
        "3a47b0981ed7c10f3e2800aa66bac96a3b5db28e"
    );
}

#[rstest]
fn test_check_decrypted_backup(backup_with_safari: EncryptedBackup) {
    let dest = backup_with_safari.dir.path().join("decrypted");
    let mut engine = BackupDecryptionEngine::open(&backup_with_safari.root()).unwrap();
    engine.unlock_with_password(PASSWORD).unwrap();
    engine.process_backup(&dest, None).unwrap();

    let mut iocs = StixIndicators::new();
    iocs.add_bundle(
        &stix_bundle(&[
            "[domain-name:value = 'evil.example']",
            "[file:name = 'notes.txt']",
        ]),
        "t",
    )
    .unwrap();

    let registry = builtin_registry().unwrap();
    let summary = ExecutionDriver::new(&registry)
        .run_all(&dest, SourceKind::Backup, Some(&iocs), &RunOptions::new())
        .unwrap();

    assert_eq!(
        summary.report("InteractionC").unwrap().status,
        ModuleStatus::ArtifactNotFound
    );
    assert_eq!(
        summary.report("SafariBrowserState").unwrap().status,
        ModuleStatus::Completed {
            results: 1,
            detected: Some(1)
        }
    );
    // Directory row plus every file
    let files = backup_with_safari.files.len();
    assert_eq!(
        summary.report("Manifest").unwrap().status,
        ModuleStatus::Completed {
            results: files + 1,
            detected: Some(1)
        }
    );
}

#[rstest]
fn test_recheck_of_backup_snapshot_matches_live(backup_with_safari: EncryptedBackup) {
    let dest = backup_with_safari.dir.path().join("decrypted");
    let mut engine = BackupDecryptionEngine::open(&backup_with_safari.root()).unwrap();
    engine.unlock_with_password(PASSWORD).unwrap();
    engine.process_backup(&dest, None).unwrap();

    let mut iocs = StixIndicators::new();
    iocs.add_bundle(&stix_bundle(&["[file:name = 'notes.txt']"]), "t")
        .unwrap();

    let registry = builtin_registry().unwrap();
    let manifest = registry.find_by_slug("manifest").unwrap();
    let outcome = assert_recheck_matches_live(
        manifest.build(ModuleContext::new(manifest.name, &dest, SourceKind::Backup)),
        manifest.slug,
        &iocs,
    );
    assert_eq!(outcome, IndicatorOutcome::Checked { detected: 1 });
}

#[rstest]
fn test_manifest_events_carry_domain_and_path(backup_with_safari: EncryptedBackup) {
    let dest = backup_with_safari.dir.path().join("decrypted");
    let mut engine = BackupDecryptionEngine::open(&backup_with_safari.root()).unwrap();
    engine.unlock_with_password(PASSWORD).unwrap();
    engine.process_backup(&dest, None).unwrap();

    let ctx = ModuleContext::new(Manifest::NAME, &dest, SourceKind::Backup);
    let records = Manifest.run(&ctx).unwrap();
    let notes = records
        .iter()
        .find(|r| r.relative_path == "Documents/notes.txt")
        .unwrap();
    assert_eq!(notes.mode.as_deref(), Some("100644"));
    assert_eq!(notes.size, Some(100));

    let events = Manifest.serialize(notes);
    assert_eq!(events.len(), 3);
    assert!(events
        .iter()
        .all(|e| e.data == "AppDomain-com.example.app--Documents/notes.txt"));
}
