//! Test configuration helpers for building services around an engine binary

use std::path::PathBuf;
use std::time::Duration;
use sbom_convert::config::{ConverterConfig, DispatchConfig, PersistenceConfig, ReconcileConfig};
use sbom_convert::{Config, JobId, JobInfo, SbomService, Status};
use tempfile::TempDir;

/// Error type for test configuration
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Locate a real engine for live tests
///
/// Reads `SBOM_CONVERTER_PATH` (from the environment or `.env`), falling
/// back to `syft` on PATH.
pub fn load_converter_path() -> Result<PathBuf, ConfigError> {
    dotenvy::dotenv().ok();

    if let Ok(path) = std::env::var("SBOM_CONVERTER_PATH") {
        return Ok(PathBuf::from(path));
    }

    which::which("syft")
        .map_err(|_| ConfigError("SBOM_CONVERTER_PATH not set and syft not in PATH".to_string()))
}

/// Check whether a real engine is available
pub fn has_live_converter() -> bool {
    load_converter_path().is_ok()
}

/// Skip test if no real engine is available
#[macro_export]
macro_rules! skip_if_no_converter {
    () => {
        if !$crate::common::has_live_converter() {
            eprintln!("Skipping test: no SBOM engine found (set SBOM_CONVERTER_PATH)");
            return;
        }
    };
}

/// Configuration rooted in `temp_dir`, using the engine at `engine`
pub fn service_config(temp_dir: &TempDir, engine: PathBuf) -> Config {
    Config {
        persistence: PersistenceConfig {
            database_path: temp_dir.path().join("test.db"),
        },
        converter: ConverterConfig {
            binary_path: Some(engine),
            search_path: false,
            timeout: Duration::from_secs(60),
            ..Default::default()
        },
        dispatch: DispatchConfig {
            max_concurrent_jobs: 2,
            ..Default::default()
        },
        reconcile: ReconcileConfig {
            interval: Duration::from_millis(100),
        },
        download: sbom_convert::config::DownloadConfig {
            scratch_dir: Some(temp_dir.path().join("scratch")),
            ..Default::default()
        },
    }
}

/// Create a running service around `engine`
///
/// Returns the service and temp directory (keep temp_dir alive for test duration)
pub async fn create_service(engine: PathBuf) -> Result<(SbomService, TempDir), ConfigError> {
    let temp_dir = tempfile::tempdir()
        .map_err(|e| ConfigError(format!("Failed to create temp dir: {}", e)))?;

    let service = SbomService::new(service_config(&temp_dir, engine))
        .await
        .map_err(|e| ConfigError(format!("Failed to create service: {}", e)))?;

    Ok((service, temp_dir))
}

/// Poll the job until it reaches a terminal status
pub async fn wait_for_terminal(
    service: &SbomService,
    id: JobId,
    timeout: Duration,
) -> Result<JobInfo, ConfigError> {
    tokio::time::timeout(timeout, async {
        loop {
            match service.get_job(id).await {
                Ok(job) if job.status.is_terminal() => return Ok(job),
                Ok(_) => tokio::time::sleep(Duration::from_millis(25)).await,
                Err(e) => return Err(ConfigError(format!("Failed to read job {}: {}", id, e))),
            }
        }
    })
    .await
    .map_err(|_| ConfigError(format!("job {} did not finish within {:?}", id, timeout)))?
}

/// Count entries left in the scratch parent
pub fn scratch_entries(temp_dir: &TempDir) -> usize {
    std::fs::read_dir(temp_dir.path().join("scratch"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

/// Whether `status` is one a job can sit in before it finishes
pub fn is_unfinished(status: Status) -> bool {
    matches!(status, Status::Queued | Status::Working)
}
