use chrono::Utc;

use scout_core::models::{Listing, Run};
use scout_db::Database;

async fn setup() -> Database {
    let db = Database::connect_in_memory().await.expect("connect");
    db.migrate().await.expect("migrate");
    db
}

fn listing(identity: &str) -> Listing {
    Listing {
        identity: identity.into(),
        source: "upwork".into(),
        title: "Rust Engineer".into(),
        organization: "Upwork Client".into(),
        url: "https://example.com/j".into(),
        compensation: "$75/hr".into(),
        description: "Build a pipeline".into(),
        posted_at: Some("2026-08-20T10:00:00Z".into()),
        raw: serde_json::json!({"id": "abc", "nested": {"k": 1}}),
        found_at: Some(Utc::now()),
        sent_at: None,
        filtered_reason: None,
    }
}

#[tokio::test]
async fn upsert_and_get_roundtrip() {
    let db = setup().await;
    let ledger = db.ledger();
    let item = listing("upwork:abc");

    ledger.upsert_listing(&item).await.unwrap();
    let fetched = ledger.get_listing("upwork:abc").await.unwrap().unwrap();

    assert_eq!(fetched.identity, item.identity);
    assert_eq!(fetched.title, item.title);
    assert_eq!(fetched.compensation, item.compensation);
    assert_eq!(fetched.posted_at, item.posted_at);
    assert_eq!(fetched.raw, item.raw);
    assert!(fetched.sent_at.is_none());
    assert!(fetched.filtered_reason.is_none());
}

#[tokio::test]
async fn get_missing_listing_returns_none() {
    let db = setup().await;
    assert!(db.ledger().get_listing("nope:1").await.unwrap().is_none());
}

#[tokio::test]
async fn seen_flips_after_first_record() {
    let db = setup().await;
    let ledger = db.ledger();

    assert!(!ledger.seen("upwork:abc").await.unwrap());
    ledger.upsert_listing(&listing("upwork:abc")).await.unwrap();
    assert!(ledger.seen("upwork:abc").await.unwrap());
}

#[tokio::test]
async fn upsert_updates_lifecycle_but_keeps_found_at() {
    let db = setup().await;
    let ledger = db.ledger();

    let mut item = listing("upwork:abc");
    ledger.upsert_listing(&item).await.unwrap();
    let original_found_at = ledger
        .get_listing("upwork:abc")
        .await
        .unwrap()
        .unwrap()
        .found_at;

    item.sent_at = Some(Utc::now());
    item.found_at = Some(Utc::now());
    ledger.upsert_listing(&item).await.unwrap();

    let fetched = ledger.get_listing("upwork:abc").await.unwrap().unwrap();
    assert!(fetched.sent_at.is_some());
    assert_eq!(fetched.found_at, original_found_at);
}

#[tokio::test]
async fn run_insert_update_roundtrip() {
    let db = setup().await;
    let ledger = db.ledger();

    let mut run = Run::begin();
    ledger.insert_run(&run).await.unwrap();

    run.found_count = 4;
    run.sent_count = 2;
    run.finish();
    ledger.update_run(&run).await.unwrap();

    let runs = ledger.recent_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, run.id);
    assert_eq!(runs[0].found_count, 4);
    assert_eq!(runs[0].sent_count, 2);
    assert!(runs[0].finished_at.is_some());
    assert!(runs[0].error.is_none());
}

#[tokio::test]
async fn update_unknown_run_fails() {
    let db = setup().await;
    let run = Run::begin();
    assert!(db.ledger().update_run(&run).await.is_err());
}

#[tokio::test]
async fn recent_runs_orders_newest_first_and_limits() {
    let db = setup().await;
    let ledger = db.ledger();

    let mut ids = Vec::new();
    for i in 0..3 {
        let mut run = Run::begin();
        // Force distinct, ordered start times regardless of clock resolution.
        run.started_at = Utc::now() + chrono::TimeDelta::seconds(i);
        ledger.insert_run(&run).await.unwrap();
        ids.push(run.id);
    }

    let runs = ledger.recent_runs(2).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].id, ids[2]);
    assert_eq!(runs[1].id, ids[1]);
}

#[tokio::test]
async fn failed_run_records_error() {
    let db = setup().await;
    let ledger = db.ledger();

    let mut run = Run::begin();
    ledger.insert_run(&run).await.unwrap();
    run.error = Some("Database error: disk I/O error".into());
    ledger.update_run(&run).await.unwrap();

    let runs = ledger.recent_runs(1).await.unwrap();
    assert_eq!(
        runs[0].error.as_deref(),
        Some("Database error: disk I/O error")
    );
    assert!(runs[0].finished_at.is_none());
}

#[tokio::test]
async fn file_backed_ledger_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scout.db");
    let config = scout_core::config::DatabaseConfig {
        path: path.to_string_lossy().into_owned(),
    };

    {
        let db = Database::connect(&config).await.unwrap();
        db.migrate().await.unwrap();
        db.ledger().upsert_listing(&listing("upwork:abc")).await.unwrap();
    }

    let db = Database::connect(&config).await.unwrap();
    db.migrate().await.unwrap();
    assert!(db.ledger().seen("upwork:abc").await.unwrap());
}
