//! End-to-end importer tests
//!
//! Import a directory holding the Guji fixture, its photo and a broken log,
//! then reopen the store and list what was kept.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use roastlog::{BatchStatus, EngineConfig, FileStatus, RoastFilter, RoastLevel};
use roastlog_importer::report::{render_summaries, ReportFormat};
use roastlog_importer::{discover_logs, run_import, DuplicatePolicy, RoastStore};

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("roastlog")
        .join("tests")
        .join("fixtures")
        .join("guji_natural.alog")
}

// ============================================================================
// Import Tests
// ============================================================================

#[tokio::test]
async fn test_import_directory_then_list() {
    let inbox = tempfile::tempdir().unwrap();
    fs::copy(fixture(), inbox.path().join("guji.alog")).unwrap();
    fs::write(inbox.path().join("guji.jpg"), b"jpeg").unwrap();
    fs::write(inbox.path().join("truncated.alog"), "{'roastUUID': 'x', 'timex': [0.0,").unwrap();
    fs::write(inbox.path().join("readme.txt"), "not a log").unwrap();

    let store_dir = tempfile::tempdir().unwrap();
    let files = discover_logs(&[inbox.path().to_path_buf()]).unwrap();
    assert_eq!(files.len(), 2);

    let mut store = RoastStore::open(store_dir.path()).unwrap();
    let report = run_import(
        files,
        &mut store,
        Arc::new(EngineConfig::default()),
        4,
        DuplicatePolicy::Skip,
    )
    .await;

    assert_eq!(report.status(), BatchStatus::PartiallyCreated);
    assert_eq!(report.status().http_status(), 207);
    assert_eq!(report.results[0].status, FileStatus::Success);
    assert_eq!(report.results[0].title.as_deref(), Some("Ethiopia Guji \u{2013} natural"));
    assert_eq!(report.results[1].error_code.as_deref(), Some("MALFORMED_DOCUMENT"));

    let reopened = RoastStore::open(store_dir.path()).unwrap();
    let entry = reopened.get("4f9c2a1e8b7d4c3e9a6f1b2c3d4e5f60").unwrap();
    assert!(entry.image_file.is_some());
    assert_eq!(entry.summary.roast_level, Some(RoastLevel::Medium));

    let record_file = store_dir.path().join("records").join(format!("{}.json", entry.id));
    let record: serde_json::Value = serde_json::from_str(&fs::read_to_string(record_file).unwrap()).unwrap();
    assert_eq!(record["record"]["roast_level"], "medium");
    assert_eq!(record["record"]["drop_bt"], 208.0);

    let listed = render_summaries(&reopened.summaries(&RoastFilter::default()), ReportFormat::Csv).unwrap();
    assert_eq!(listed.lines().count(), 2);
}

#[tokio::test]
async fn test_reimport_is_skipped() {
    let store_dir = tempfile::tempdir().unwrap();
    let mut store = RoastStore::open(store_dir.path()).unwrap();
    let engine = Arc::new(EngineConfig::default());

    let first = run_import(vec![fixture()], &mut store, engine.clone(), 1, DuplicatePolicy::Skip).await;
    assert_eq!(first.status(), BatchStatus::Created);

    let second = run_import(vec![fixture()], &mut store, engine, 1, DuplicatePolicy::Skip).await;
    assert_eq!(second.status(), BatchStatus::Failed);
    assert_eq!(second.results[0].status, FileStatus::Skipped);
    assert_eq!(
        second.results[0].error.as_deref(),
        Some("Roast with UUID 4f9c2a1e8b7d4c3e9a6f1b2c3d4e5f60 already exists")
    );
    assert_eq!(store.len(), 1);
}
