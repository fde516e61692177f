//! Shared test helpers: fake converter, fake dispatcher and service builder.

use crate::config::{ArchivePolicy, Config};
use crate::converter::{ConverterCapabilities, SbomConverter};
use crate::db::Database;
use crate::dispatch::TaskDispatcher;
use crate::error::{ConversionError, Error, Result};
use crate::service::SbomService;
use crate::types::{JobId, SbomFormat, Status, TaskHandle};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio::sync::Mutex;

/// Minimal CycloneDX document used as a download fixture
pub(crate) const MINIMAL_CYCLONEDX: &str =
    r#"{"bomFormat": "CycloneDX", "specVersion": "1.4", "components": []}"#;

/// SHA-256 of [`MINIMAL_CYCLONEDX`]
pub(crate) const MINIMAL_CYCLONEDX_SHA256: &str =
    "ae269ceca2b1dffe7b158351fea7666c191dc1beb4057e3e949f6f7d50655c2b";

/// What the fake converter does with an artifact
#[derive(Clone, Copy, Debug)]
pub(crate) enum FakeBehavior {
    /// Parse the artifact as JSON and return it
    EchoJson,
    /// Fail like an engine exiting with status 1
    Fail,
    /// Panic inside the conversion
    Panic,
}

/// In-memory converter recording what it was asked to do
pub(crate) struct FakeConverter {
    behavior: FakeBehavior,
    pub(crate) calls: AtomicUsize,
    pub(crate) seen_paths: Mutex<Vec<PathBuf>>,
}

impl FakeConverter {
    pub(crate) fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            seen_paths: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SbomConverter for FakeConverter {
    async fn convert(&self, artifact: &Path, format: SbomFormat) -> Result<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_paths.lock().await.push(artifact.to_path_buf());

        match self.behavior {
            FakeBehavior::EchoJson => {
                let contents = tokio::fs::read_to_string(artifact).await?;
                serde_json::from_str(&contents).map_err(|e| {
                    Error::from(ConversionError::InvalidOutput {
                        format: format.to_string(),
                        reason: e.to_string(),
                    })
                })
            }
            FakeBehavior::Fail => Err(ConversionError::ExitFailure {
                format: format.to_string(),
                code: Some(1),
                stderr: "engine failed".to_string(),
            }
            .into()),
            FakeBehavior::Panic => panic!("fake converter blew up"),
        }
    }

    async fn version(&self) -> Result<String> {
        Ok("1.4.1".to_string())
    }

    fn capabilities(&self) -> ConverterCapabilities {
        ConverterCapabilities {
            can_convert: true,
            can_report_version: true,
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Dispatcher that never runs anything; tests drive jobs and statuses by hand
#[derive(Default)]
pub(crate) struct FakeDispatcher {
    next: AtomicUsize,
    pub(crate) enqueued: Mutex<Vec<JobId>>,
    statuses: Mutex<HashMap<TaskHandle, Status>>,
    pub(crate) reject: AtomicBool,
}

impl FakeDispatcher {
    /// Set (or with `None`, forget) the status reported for `handle`
    pub(crate) async fn set_status(&self, handle: &TaskHandle, status: Option<Status>) {
        let mut statuses = self.statuses.lock().await;
        match status {
            Some(status) => {
                statuses.insert(handle.clone(), status);
            }
            None => {
                statuses.remove(handle);
            }
        }
    }
}

#[async_trait]
impl TaskDispatcher for FakeDispatcher {
    async fn enqueue(&self, job_id: JobId) -> Result<TaskHandle> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(Error::Dispatch("work queue closed".into()));
        }
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = TaskHandle(format!("task-{}", n));
        self.enqueued.lock().await.push(job_id);
        self.statuses
            .lock()
            .await
            .insert(handle.clone(), Status::Queued);
        Ok(handle)
    }

    async fn status(&self, handle: &TaskHandle) -> Result<Option<Status>> {
        Ok(self.statuses.lock().await.get(handle).copied())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Test configuration rooted in `dir`
pub(crate) fn test_config(dir: &TempDir, archive_policy: ArchivePolicy) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.path().join("test.db");
    config.download.scratch_dir = Some(dir.path().join("scratch"));
    config.converter.search_path = false;
    config.converter.archive_policy = archive_policy;
    config
}

/// Build a service around fakes; keep the returned TempDir alive for the test
pub(crate) async fn create_test_service(
    converter: Arc<FakeConverter>,
    archive_policy: ArchivePolicy,
) -> (SbomService, Arc<FakeDispatcher>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir, archive_policy);

    let db = Database::new(&config.persistence.database_path)
        .await
        .unwrap();
    let dispatcher = Arc::new(FakeDispatcher::default());

    let service =
        SbomService::with_components(config, db, converter, dispatcher.clone()).unwrap();

    (service, dispatcher, temp_dir)
}

/// Entries left in the scratch parent directory
pub(crate) fn scratch_entries(dir: &TempDir) -> usize {
    match std::fs::read_dir(dir.path().join("scratch")) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
