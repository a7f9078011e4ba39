//! Run ledger database initialization tests

use mlc_common::db::init_database;
use tempfile::TempDir;

#[tokio::test]
async fn test_creates_database_and_runs_table() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("sub").join("ledger.db");

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists());

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'runs'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("ledger.db");

    let pool = init_database(&db_path).await.unwrap();
    pool.close().await;

    // Second open must not fail on existing tables
    let pool = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM runs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}
