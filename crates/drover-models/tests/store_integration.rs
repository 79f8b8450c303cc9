//! Integration tests for the file-backed performance store.
//!
//! Verifies durability across reopen, crash-safe whole-document writes, and
//! the degraded-storage path: a failed flush keeps session data intact and a
//! later successful record heals the on-disk state.

use drover_core::{GateOutcome, ModelCompletionRecord};
use drover_models::{FileModelPerformanceStore, ModelPerformanceStore};
use tempfile::TempDir;

fn record(item: &str, model: &str, gate: GateOutcome) -> ModelCompletionRecord {
    ModelCompletionRecord::new(item, model, 10.0, gate)
}

#[tokio::test]
async fn attempt_invariant_holds_across_mixed_outcomes() {
    let dir = TempDir::new().unwrap();
    let store = FileModelPerformanceStore::open(dir.path()).await.unwrap();

    store
        .record(&record("W-1", "m-a", GateOutcome::Passed))
        .await
        .unwrap();
    store
        .record(&record("W-2", "m-a", GateOutcome::Failed))
        .await
        .unwrap();
    store
        .record(&record("W-3", "m-a", GateOutcome::Unknown))
        .await
        .unwrap();

    let summary = store.load("m-a").await;
    assert_eq!(summary.total_items_attempted, 3);
    assert_eq!(
        summary.total_items_attempted,
        summary.total_items_succeeded + summary.total_items_failed
    );
    assert_eq!(summary.total_items_succeeded, 1);
}

#[tokio::test]
async fn reopen_resumes_from_persisted_totals() {
    let dir = TempDir::new().unwrap();
    {
        let store = FileModelPerformanceStore::open(dir.path()).await.unwrap();
        store
            .record(&record("W-1", "m-a", GateOutcome::Passed))
            .await
            .unwrap();
    }
    {
        let store = FileModelPerformanceStore::open(dir.path()).await.unwrap();
        store
            .record(&record("W-2", "m-a", GateOutcome::Passed))
            .await
            .unwrap();
    }

    let store = FileModelPerformanceStore::open(dir.path()).await.unwrap();
    assert_eq!(store.load("m-a").await.total_items_attempted, 2);
}

#[tokio::test]
async fn unreadable_summary_is_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(dir.path().join("garbage.json"), b"{not json")
        .await
        .unwrap();

    let store = FileModelPerformanceStore::open(dir.path()).await.unwrap();
    assert!(store.load_all().await.is_empty());

    // The store still records normally next to the corrupt file.
    store
        .record(&record("W-1", "m-a", GateOutcome::Passed))
        .await
        .unwrap();
    assert_eq!(store.load("m-a").await.total_items_attempted, 1);
}

#[tokio::test]
async fn failed_flush_keeps_memory_and_heals_on_next_record() {
    let base = TempDir::new().unwrap();
    let store_dir = base.path().join("perf");
    let store = FileModelPerformanceStore::open(&store_dir).await.unwrap();

    store
        .record(&record("W-1", "m-a", GateOutcome::Passed))
        .await
        .unwrap();

    // Degrade storage: replace the store directory with a plain file so
    // every write under it fails.
    tokio::fs::remove_dir_all(&store_dir).await.unwrap();
    tokio::fs::write(&store_dir, b"not a directory").await.unwrap();

    let err = store
        .record(&record("W-2", "m-a", GateOutcome::Failed))
        .await;
    assert!(err.is_err(), "flush into a non-directory must fail");

    // The in-memory session view kept both records.
    let summary = store.load("m-a").await;
    assert_eq!(summary.total_items_attempted, 2);
    assert_eq!(summary.total_items_failed, 1);

    // Restore storage; the next record flushes the healed state.
    tokio::fs::remove_file(&store_dir).await.unwrap();
    store
        .record(&record("W-3", "m-a", GateOutcome::Passed))
        .await
        .unwrap();

    let reopened = FileModelPerformanceStore::open(&store_dir).await.unwrap();
    let summary = reopened.load("m-a").await;
    assert_eq!(summary.total_items_attempted, 3);
    assert_eq!(summary.total_items_succeeded, 2);
    assert_eq!(summary.total_items_failed, 1);
}
