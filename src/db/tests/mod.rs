
use crate::db::{Database, NewJob};
use tempfile::NamedTempFile;

/// Open a fresh database backed by a temp file (keep the file alive for the test)
pub(super) async fn test_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

pub(super) fn new_job(url: &str) -> NewJob {
    NewJob {
        url: url.to_string(),
        format: "cyclonedx-json".to_string(),
        ip: None,
    }
}
