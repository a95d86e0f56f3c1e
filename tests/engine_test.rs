//! Integration tests for a single engine over SQLite.
//!
//! Tests verify that:
//! - Opening is lazy: the database file appears on first use
//! - Column values decode into JSON, temporal ones per `parse_time`
//! - Driver errors pass through untouched
//! - Close is reported once, then `AlreadyClosed`

use dbgroup::db::{Engine, Role};
use dbgroup::error::DbError;
use dbgroup::models::{ConnectionDescriptor, QueryParam, Statement};
use serde_json::Value;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

fn sqlite_descriptor(dir: &TempDir, name: &str) -> ConnectionDescriptor {
    ConnectionDescriptor::sqlite(dir.path().join(name).to_string_lossy())
}

async fn open(desc: &ConnectionDescriptor) -> Engine {
    Engine::open(desc, Role::Master).await.unwrap()
}

#[tokio::test]
async fn test_open_defers_connection_until_first_use() {
    let dir = tempfile::tempdir().unwrap();
    let desc = sqlite_descriptor(&dir, "lazy.db");
    let path = dir.path().join("lazy.db");

    let engine = open(&desc).await;
    assert!(!path.exists());
    assert_eq!(engine.stats().open, 0);

    assert_ok!(engine.query(&Statement::new("SELECT 1 AS one")).await);
    assert!(path.exists());
    assert_eq!(engine.stats().open, 1);
}

#[tokio::test]
async fn test_values_decode_to_json() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&sqlite_descriptor(&dir, "types.db")).await;

    engine
        .exec(&Statement::new(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, price REAL, \
             active BOOLEAN, payload BLOB, note TEXT)",
        ))
        .await
        .unwrap();

    let inserted = engine
        .exec(
            &Statement::new(
                "INSERT INTO items (name, price, active, payload, note) VALUES (?, ?, ?, ?, ?)",
            )
            .bind("widget")
            .bind(9.5)
            .bind(true)
            .bind(b"hello world".to_vec())
            .bind(QueryParam::Null),
        )
        .await
        .unwrap();
    assert_eq!(inserted.rows_affected, 1);
    assert_eq!(inserted.last_insert_id, Some(1));

    let result = engine
        .query(&Statement::new("SELECT * FROM items"))
        .await
        .unwrap();
    assert_eq!(result.columns.len(), 6);
    assert_eq!(result.columns[1].name, "name");

    let row = &result.rows[0];
    assert_eq!(row["id"], Value::from(1));
    assert_eq!(row["name"], Value::from("widget"));
    assert_eq!(row["price"], Value::from(9.5));
    assert_eq!(row["active"], Value::Bool(true));
    assert_eq!(row["payload"], Value::from("aGVsbG8gd29ybGQ="));
    assert_eq!(row["note"], Value::Null);
}

#[tokio::test]
async fn test_parse_time_controls_datetime_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let mut desc = sqlite_descriptor(&dir, "time.db");

    let raw = open(&desc).await;
    raw.exec(&Statement::new(
        "CREATE TABLE logs (id INTEGER PRIMARY KEY, created DATETIME)",
    ))
    .await
    .unwrap();
    raw.exec(&Statement::new(
        "INSERT INTO logs (created) VALUES ('2019-10-12 21:20:58')",
    ))
    .await
    .unwrap();

    let select = Statement::new("SELECT created FROM logs");
    let row = raw.get(&select).await.unwrap().unwrap();
    assert_eq!(row["created"], Value::from("2019-10-12 21:20:58"));
    raw.close().await.unwrap();

    desc.parse_time = true;
    let parsed = open(&desc).await;
    let row = parsed.get(&select).await.unwrap().unwrap();
    assert_eq!(row["created"], Value::from("2019-10-12T21:20:58Z"));
}

#[tokio::test]
async fn test_driver_errors_pass_through() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&sqlite_descriptor(&dir, "errors.db")).await;

    let err = assert_err!(engine.query(&Statement::new("SELECT * FROM missing")).await);
    assert!(
        matches!(err, DbError::Driver(sqlx::Error::Database(_))),
        "expected driver error, got {err:?}"
    );
    assert!(err.to_string().contains("no such table"));

    // Failed calls still count as received
    assert_eq!(engine.stats().queries, 1);
}

#[tokio::test]
async fn test_get_on_empty_result_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&sqlite_descriptor(&dir, "empty.db")).await;
    engine
        .exec(&Statement::new("CREATE TABLE t (id INTEGER)"))
        .await
        .unwrap();

    let row = assert_ok!(engine.get(&Statement::new("SELECT id FROM t")).await);
    assert!(row.is_none());
}

#[tokio::test]
async fn test_show_sql_logging_does_not_change_results() {
    let dir = tempfile::tempdir().unwrap();
    let mut desc = sqlite_descriptor(&dir, "logged.db");
    desc.show_sql = true;
    desc.show_exec_time = true;

    let engine = open(&desc).await;
    let row = engine
        .get(&Statement::new("SELECT ? AS greeting").bind("hi"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row["greeting"], Value::from("hi"));
}

#[tokio::test]
async fn test_engine_close_twice() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&sqlite_descriptor(&dir, "close.db")).await;
    assert_ok!(engine.query(&Statement::new("SELECT 1")).await);

    assert_ok!(engine.close().await);
    let err = assert_err!(engine.close().await);
    assert!(matches!(err, DbError::AlreadyClosed { .. }));

    let err = assert_err!(engine.exec(&Statement::new("SELECT 1")).await);
    assert!(matches!(err, DbError::AlreadyClosed { .. }));

    assert!(engine.stats().closed);
}

#[tokio::test]
async fn test_stats_reflect_limits() {
    let dir = tempfile::tempdir().unwrap();
    let mut desc = sqlite_descriptor(&dir, "limits.db");
    desc.max_open_conns = 4;
    desc.max_idle_conns = 2;

    let engine = open(&desc).await;
    let stats = engine.stats();
    assert_eq!(stats.role, Role::Master);
    assert_eq!(stats.max_open, 4);
    assert_eq!(stats.max_idle, 2);
    assert_eq!(stats.in_use, 0);
    assert!(!stats.closed);
}

#[tokio::test]
async fn test_single_connection_lowers_idle_limit() {
    let dir = tempfile::tempdir().unwrap();
    let mut desc = sqlite_descriptor(&dir, "single.db");
    desc.max_open_conns = 1;

    let engine = open(&desc).await;
    assert_ok!(engine.query(&Statement::new("SELECT 1")).await);

    let stats = engine.stats();
    assert_eq!(stats.max_open, 1);
    assert_eq!(stats.max_idle, 1);
}

#[tokio::test]
async fn test_mismatched_storage_class_decodes_to_null() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&sqlite_descriptor(&dir, "mismatch.db")).await;
    engine
        .exec(&Statement::new("CREATE TABLE counters (id INTEGER PRIMARY KEY, hits INTEGER)"))
        .await
        .unwrap();
    // SQLite keeps the blob as is despite the INTEGER affinity
    engine
        .exec(&Statement::new("INSERT INTO counters (hits) VALUES (x'0102')"))
        .await
        .unwrap();

    let row = engine
        .get(&Statement::new("SELECT id, hits FROM counters"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row["id"], Value::from(1));
    assert_eq!(row["hits"], Value::Null);
}
