//! Configuration types for sbom-convert

use crate::types::SbomFormat;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Artifact download configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Deadline for the whole transfer, headers to last byte (default: 300 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Deadline for establishing the TCP/TLS connection (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Maximum number of redirects followed (default: 10)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Reject artifacts larger than this many bytes (None = unlimited)
    #[serde(default)]
    pub max_size_bytes: Option<u64>,

    /// User-Agent header sent with artifact requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Parent directory for per-job scratch directories (None = system temp dir)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: default_download_timeout(),
            connect_timeout: default_connect_timeout(),
            max_redirects: default_max_redirects(),
            max_size_bytes: None,
            user_agent: default_user_agent(),
            scratch_dir: None,
        }
    }
}

/// External converter configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Path to the converter executable (auto-detected if None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Executable name searched for in PATH (default: "syft")
    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// Whether to search PATH for the converter if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Deadline for a single conversion run (default: 300 seconds)
    #[serde(default = "default_convert_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Output format used when a job does not request one
    #[serde(default)]
    pub default_format: SbomFormat,

    /// What to do with archive artifacts
    #[serde(default)]
    pub archive_policy: ArchivePolicy,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            binary_name: default_binary_name(),
            search_path: true,
            timeout: default_convert_timeout(),
            default_format: SbomFormat::default(),
            archive_policy: ArchivePolicy::default(),
        }
    }
}

/// Handling of archive artifacts (zip, tar, gzip, ...)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchivePolicy {
    /// Complete the job with an empty result set without running the converter
    #[default]
    Skip,
    /// Hand the archive to the converter like any other artifact
    Convert,
}

/// In-process task dispatch configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum jobs executing at the same time (default: 4)
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// How long a finished task's status stays queryable (default: 30 minutes)
    #[serde(default = "default_status_ttl", with = "duration_serde")]
    pub status_ttl: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            status_ttl: default_status_ttl(),
        }
    }
}

/// Periodic status sweep configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Interval between sweeps over unfinished jobs (default: 60 seconds)
    #[serde(default = "default_reconcile_interval", with = "duration_serde")]
    pub interval: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: default_reconcile_interval(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./sbom-convert.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for SbomService
///
/// Fields are organized into sub-configs:
/// - [`download`](DownloadConfig): artifact fetching limits
/// - [`converter`](ConverterConfig): external converter binary and policy
/// - [`dispatch`](DispatchConfig): worker pool sizing and status retention
/// - [`reconcile`](ReconcileConfig): periodic status sweep
/// - [`persistence`](PersistenceConfig): database location
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Artifact download settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Converter settings
    #[serde(default)]
    pub converter: ConverterConfig,

    /// Worker pool settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Status sweep settings
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Data storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Check values that deserialize fine but cannot work at runtime
    pub fn validate(&self) -> crate::Result<()> {
        if self.dispatch.max_concurrent_jobs == 0 {
            return Err(crate::Error::Config {
                message: "max_concurrent_jobs must be at least 1".into(),
                key: Some("dispatch.max_concurrent_jobs".into()),
            });
        }
        if self.download.timeout.is_zero() {
            return Err(crate::Error::Config {
                message: "download timeout must be greater than zero".into(),
                key: Some("download.timeout".into()),
            });
        }
        if self.converter.timeout.is_zero() {
            return Err(crate::Error::Config {
                message: "converter timeout must be greater than zero".into(),
                key: Some("converter.timeout".into()),
            });
        }
        if self.reconcile.interval.is_zero() {
            return Err(crate::Error::Config {
                message: "reconcile interval must be greater than zero".into(),
                key: Some("reconcile.interval".into()),
            });
        }
        if self.converter.binary_name.trim().is_empty() && self.converter.binary_path.is_none()
        {
            return Err(crate::Error::Config {
                message: "either binary_path or binary_name must be set".into(),
                key: Some("converter.binary_name".into()),
            });
        }
        Ok(())
    }
}

// Default value functions
fn default_download_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    format!("sbom-convert/{}", env!("CARGO_PKG_VERSION"))
}

fn default_binary_name() -> String {
    "syft".to_string()
}

fn default_true() -> bool {
    true
}

fn default_convert_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_status_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_reconcile_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("sbom-convert.db")
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.download.timeout, Duration::from_secs(300));
        assert_eq!(config.download.max_redirects, 10);
        assert_eq!(config.converter.binary_name, "syft");
        assert!(config.converter.search_path);
        assert_eq!(config.converter.default_format, SbomFormat::CycloneDxJson);
        assert_eq!(config.converter.archive_policy, ArchivePolicy::Skip);
        assert_eq!(config.dispatch.max_concurrent_jobs, 4);
        assert_eq!(config.dispatch.status_ttl, Duration::from_secs(1800));
        assert_eq!(config.reconcile.interval, Duration::from_secs(60));
        assert_eq!(
            config.persistence.database_path,
            PathBuf::from("sbom-convert.db")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn durations_are_seconds() {
        let config: Config = serde_json::from_str(
            r#"{
                "download": { "timeout": 12, "max_size_bytes": 1024 },
                "converter": { "timeout": 7, "default_format": "spdx-json", "archive_policy": "convert" },
                "reconcile": { "interval": 5 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.download.timeout, Duration::from_secs(12));
        assert_eq!(config.download.max_size_bytes, Some(1024));
        assert_eq!(config.converter.timeout, Duration::from_secs(7));
        assert_eq!(config.converter.default_format, SbomFormat::SpdxJson);
        assert_eq!(config.converter.archive_policy, ArchivePolicy::Convert);
        assert_eq!(config.reconcile.interval, Duration::from_secs(5));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["download"]["timeout"], 12);
        assert_eq!(json["converter"]["default_format"], "spdx-json");
    }

    #[test]
    fn validate_rejects_unusable_values() {
        let mut config = Config::default();
        config.dispatch.max_concurrent_jobs = 0;
        match config.validate() {
            Err(crate::Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("dispatch.max_concurrent_jobs"));
            }
            other => panic!("expected config error, got {:?}", other),
        }

        let mut config = Config::default();
        config.converter.timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.converter.binary_name = String::new();
        assert!(config.validate().is_err());
        config.converter.binary_path = Some(PathBuf::from("/usr/local/bin/syft"));
        assert!(config.validate().is_ok());
    }
}
