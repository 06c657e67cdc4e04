
use crate::db::Database;
use std::sync::Arc;
use tempfile::NamedTempFile;

async fn test_db() -> (Arc<Database>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (Arc::new(db), temp_file)
}
