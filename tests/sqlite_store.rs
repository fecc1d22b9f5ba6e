use std::sync::Arc;
use std::time::Duration;

use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    PaginatorTrait, Set,
};
use seaorm_session_store::entity::{session, user_session};
use seaorm_session_store::{
    schema, Error, ExpiredDeletion, SessionStore, SqliteStore, StorageHandle,
};
use serde_json::json;

/// Makes the store's warn-level output (swallowed user-index failures)
/// visible when a test fails.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One pooled connection, so every statement sees the same in-memory
/// database.
async fn memory_conn() -> DatabaseConnection {
    init_tracing();
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    Database::connect(options)
        .await
        .expect("connect to in-memory sqlite")
}

async fn new_store() -> (SqliteStore, DatabaseConnection) {
    let conn = memory_conn().await;
    schema::ensure_schema(&conn).await.expect("bootstrap schema");
    (SqliteStore::new(conn.clone()), conn)
}

#[tokio::test]
async fn round_trip() {
    let (store, _conn) = new_store().await;
    let state = json!({ "cookie": { "maxAge": 60_000 }, "theme": "dark" });

    store.set("s1", &state).await.unwrap();
    let loaded = store.get("s1").await.unwrap();

    assert_eq!(loaded, Some(state));
}

#[tokio::test]
async fn missing_session_is_none_not_error() {
    let (store, _conn) = new_store().await;
    assert_eq!(store.get("never-written").await.unwrap(), None);
}

#[tokio::test]
async fn expired_session_is_absent_and_removed() {
    let (store, conn) = new_store().await;
    let state = json!({ "cookie": { "maxAge": 100 } });

    store.set("s1", &state).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(store.get("s1").await.unwrap(), None);

    // The read must have reclaimed the row, not just hidden it.
    let row = session::Entity::find_by_id("s1").one(&conn).await.unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn destroy_is_idempotent() {
    let (store, _conn) = new_store().await;
    let state = json!({ "cookie": { "maxAge": 60_000 } });

    store.destroy("missing").await.unwrap();

    store.set("s1", &state).await.unwrap();
    store.destroy("s1").await.unwrap();
    store.destroy("s1").await.unwrap();

    assert_eq!(store.get("s1").await.unwrap(), None);
}

#[tokio::test]
async fn destroy_removes_user_session_record() {
    let (store, conn) = new_store().await;
    let state = json!({ "cookie": { "maxAge": 60_000 }, "userId": "u1" });

    store.set("s1", &state).await.unwrap();
    store.destroy("s1").await.unwrap();

    let rows = user_session::Entity::find().all(&conn).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn reauthentication_replaces_user_session_record() {
    let (store, conn) = new_store().await;

    store
        .set("s1", &json!({ "cookie": { "maxAge": 60_000 }, "userId": "u1" }))
        .await
        .unwrap();
    store
        .set("s1", &json!({ "cookie": { "maxAge": 60_000 }, "userId": "u2" }))
        .await
        .unwrap();

    let rows = user_session::Entity::find().all(&conn).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].session_id, "s1");
    assert_eq!(rows[0].user_id, "u2");
}

#[tokio::test]
async fn anonymous_session_creates_no_user_record() {
    let (store, conn) = new_store().await;

    store
        .set("s1", &json!({ "cookie": { "maxAge": 60_000 }, "views": 3 }))
        .await
        .unwrap();

    assert!(session::Entity::find_by_id("s1")
        .one(&conn)
        .await
        .unwrap()
        .is_some());
    let rows = user_session::Entity::find().all(&conn).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn passport_user_populates_index() {
    let (store, conn) = new_store().await;

    store
        .set(
            "s1",
            &json!({ "cookie": { "maxAge": 60_000 }, "passport": { "user": 42 } }),
        )
        .await
        .unwrap();

    let rows = user_session::Entity::find().all(&conn).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, "42");
}

#[tokio::test]
async fn length_counts_only_live_sessions() {
    let (store, _conn) = new_store().await;

    for id in ["a", "b", "c"] {
        store
            .set(id, &json!({ "cookie": { "maxAge": 60_000 } }))
            .await
            .unwrap();
    }
    // Already expired at write time.
    store
        .set("d", &json!({ "cookie": { "maxAge": -1_000 } }))
        .await
        .unwrap();

    assert_eq!(store.length().await.unwrap(), 3);
}

#[tokio::test]
async fn touch_extends_expiry_without_rewriting_data() {
    let (store, conn) = new_store().await;
    let original = json!({ "cookie": { "maxAge": 100 }, "userId": "u1" });

    store.set("s1", &original).await.unwrap();
    store
        .touch("s1", &json!({ "cookie": { "maxAge": 60_000 }, "userId": "u1" }))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Still alive past the original expiry, with the original data intact.
    assert_eq!(store.get("s1").await.unwrap(), Some(original));

    let rows = user_session::Entity::find().all(&conn).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, "u1");
}

#[tokio::test]
async fn touch_on_missing_session_is_noop() {
    let (store, _conn) = new_store().await;
    store
        .touch("missing", &json!({ "cookie": { "maxAge": 60_000 } }))
        .await
        .unwrap();
    assert_eq!(store.get("missing").await.unwrap(), None);
}

#[tokio::test]
async fn clear_empties_both_tables() {
    let (store, conn) = new_store().await;

    store
        .set("s1", &json!({ "cookie": { "maxAge": 60_000 }, "userId": "u1" }))
        .await
        .unwrap();
    store
        .set("s2", &json!({ "cookie": { "maxAge": 60_000 } }))
        .await
        .unwrap();

    store.clear().await.unwrap();

    assert_eq!(session::Entity::find().count(&conn).await.unwrap(), 0);
    assert_eq!(user_session::Entity::find().count(&conn).await.unwrap(), 0);
}

#[tokio::test]
async fn corrupt_record_surfaces_decode_error() {
    let (store, conn) = new_store().await;

    let row = session::ActiveModel {
        id: Set("bad".to_owned()),
        data: Set("{not valid json".to_owned()),
        expires_at: Set((chrono::Utc::now() + chrono::Duration::hours(1)).fixed_offset()),
        created_at: Set(None),
    };
    row.insert(&conn).await.unwrap();

    let err = store.get("bad").await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn fresh_connection_bootstraps_on_first_use() {
    // No manual ensure_schema: the handle must bootstrap the schema the
    // first time the store touches the database.
    let conn = memory_conn().await;
    let store = SqliteStore::new(conn);
    let state = json!({ "cookie": { "maxAge": 60_000 }, "userId": "u1" });

    store.set("s1", &state).await.unwrap();
    assert_eq!(store.get("s1").await.unwrap(), Some(state));
}

#[tokio::test]
async fn all_operations_work_before_any_write() {
    // Every contract operation, not just get/set, must succeed on a store
    // whose schema has never been created.
    let conn = memory_conn().await;
    let store = SqliteStore::new(conn);

    store.destroy("missing").await.unwrap();
    assert_eq!(store.length().await.unwrap(), 0);
    store
        .touch("missing", &json!({ "cookie": { "maxAge": 60_000 } }))
        .await
        .unwrap();
    store.clear().await.unwrap();
}

#[tokio::test]
async fn concurrent_first_writes_to_same_id_all_succeed() {
    // Writes are a single insert-or-replace statement: two writers racing on
    // a fresh id must both succeed, last writer wins.
    let (store, _conn) = new_store().await;

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .set("same", &json!({ "cookie": { "maxAge": 60_000 }, "writer": i }))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(store.length().await.unwrap(), 1);
    assert!(store.get("same").await.unwrap().is_some());
}

#[tokio::test]
async fn overwrite_preserves_created_at() {
    let (store, conn) = new_store().await;

    store
        .set("s1", &json!({ "cookie": { "maxAge": 60_000 }, "v": 1 }))
        .await
        .unwrap();
    let first = session::Entity::find_by_id("s1")
        .one(&conn)
        .await
        .unwrap()
        .unwrap();

    store
        .set("s1", &json!({ "cookie": { "maxAge": 60_000 }, "v": 2 }))
        .await
        .unwrap();
    let second = session::Entity::find_by_id("s1")
        .one(&conn)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.created_at, second.created_at);
    assert_eq!(
        store.get("s1").await.unwrap(),
        Some(json!({ "cookie": { "maxAge": 60_000 }, "v": 2 }))
    );
}

#[tokio::test]
async fn write_recovers_from_dropped_table() {
    let (store, conn) = new_store().await;
    let state = json!({ "cookie": { "maxAge": 60_000 } });

    store.set("s1", &state).await.unwrap();
    conn.execute_unprepared("DROP TABLE sessions").await.unwrap();

    store.set("s2", &state).await.unwrap();
    assert_eq!(store.get("s2").await.unwrap(), Some(state));
}

#[tokio::test]
async fn delete_expired_sweeps_stale_rows() {
    let (store, conn) = new_store().await;

    store
        .set("live", &json!({ "cookie": { "maxAge": 60_000 } }))
        .await
        .unwrap();
    store
        .set("stale", &json!({ "cookie": { "maxAge": -1_000 } }))
        .await
        .unwrap();

    store.delete_expired().await.unwrap();

    assert_eq!(session::Entity::find().count(&conn).await.unwrap(), 1);
    assert!(session::Entity::find_by_id("live")
        .one(&conn)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn scenario_write_read_expire() {
    let (store, _conn) = new_store().await;
    let state = json!({ "cookie": { "maxAge": 1_000 }, "userId": "u7" });

    store.set("abc", &state).await.unwrap();
    assert_eq!(store.get("abc").await.unwrap(), Some(state));

    tokio::time::sleep(Duration::from_millis(1_100)).await;

    assert_eq!(store.get("abc").await.unwrap(), None);
    assert_eq!(store.length().await.unwrap(), 0);
}

#[tokio::test]
async fn lazy_handle_connects_on_first_use() {
    // A shared handle given only connect options must come up on demand.
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    let handle = Arc::new(StorageHandle::new(options));
    let store = SqliteStore::with_handle(handle);
    let state = json!({ "cookie": { "maxAge": 60_000 } });

    store.set("s1", &state).await.unwrap();
    assert_eq!(store.get("s1").await.unwrap(), Some(state));
}
