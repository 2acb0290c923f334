use serde::{Deserialize, Serialize};

use super::*;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Sample {
    name: String,
    count: u32,
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn put_overwrites_existing_value() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.put("auth-storage", "first").await.expect("put");
    storage.put("auth-storage", "second").await.expect("put");

    assert_eq!(
        storage.get("auth-storage").await.expect("get"),
        Some("second".to_string())
    );
    assert_eq!(storage.keys().await.expect("keys"), vec!["auth-storage"]);
}

#[tokio::test]
async fn remove_is_idempotent() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.put("k", "v").await.expect("put");
    storage.remove("k").await.expect("remove");
    storage.remove("k").await.expect("remove missing");
    assert_eq!(storage.get("k").await.expect("get"), None);
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn json_helpers_round_trip_through_memory_store() {
    let store = MemoryStore::new();
    assert!(store.is_empty().await);

    save_json(
        &store,
        "sample",
        &Sample {
            name: "alice".to_string(),
            count: 3,
        },
    )
    .await
    .expect("save");

    let loaded: Option<Sample> = load_json(&store, "sample").await.expect("load");
    assert_eq!(
        loaded,
        Some(Sample {
            name: "alice".to_string(),
            count: 3
        })
    );
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn load_json_reports_corrupt_values() {
    let store = MemoryStore::new();
    store.put("sample", "{not json").await.expect("put");

    let err = load_json::<Sample>(&store, "sample")
        .await
        .expect_err("corrupt value must fail");
    assert!(err.to_string().contains("sample"), "unexpected error: {err}");
}

#[test]
fn memory_url_has_no_file_path() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/tapper.db?mode=rwc"),
        Some(PathBuf::from("./data/tapper.db"))
    );
}
