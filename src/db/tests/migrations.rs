use crate::db::*;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_reopening_database_does_not_reapply_migrations() {
    let temp_file = NamedTempFile::new().unwrap();

    let db = Database::new(temp_file.path()).await.unwrap();
    db.close().await;

    // Second open must find schema_version = 1 and skip CREATE TABLE
    let db = Database::new(temp_file.path()).await.unwrap();
    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version")
        .fetch_all(db.pool())
        .await
        .unwrap();
    assert_eq!(versions, vec![1]);

    db.close().await;
}

#[tokio::test]
async fn test_new_creates_missing_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.db");

    let db = Database::new(&path).await.unwrap();
    assert!(path.exists());

    db.close().await;
}

#[tokio::test]
async fn test_query_after_close_returns_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    db.close().await;

    let result = db.list_retention_entries().await;
    assert!(result.is_err(), "closed pool must surface an error");
}
