//! CLI-based converter using an external SBOM engine binary

use super::parser::{ExitStatus, parse_conversion_output, parse_version_output};
use super::traits::{ConverterCapabilities, SbomConverter};
use crate::error::ConversionError;
use crate::types::SbomFormat;
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;

/// Default deadline for a single converter invocation
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// CLI-based converter
///
/// Runs `<binary> convert <artifact> -o <format>` with every value passed as
/// its own argument, so no shell ever interprets the artifact path. Each
/// invocation runs under a deadline and the child is killed if it is missed.
///
/// # Examples
///
/// ```no_run
/// use sbom_convert::converter::CliConverter;
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// // Explicit path
/// let converter = CliConverter::new(PathBuf::from("/usr/local/bin/syft"))
///     .with_timeout(Duration::from_secs(60));
///
/// // Or auto-discover from PATH
/// let converter = CliConverter::from_path("syft").expect("syft not found in PATH");
/// ```
pub struct CliConverter {
    binary_path: PathBuf,
    timeout: Duration,
    version: OnceCell<String>,
}

impl CliConverter {
    /// Create a converter with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            timeout: DEFAULT_TIMEOUT,
            version: OnceCell::new(),
        }
    }

    /// Attempt to find `binary_name` in PATH
    ///
    /// Returns `None` when the binary cannot be found.
    pub fn from_path(binary_name: &str) -> Option<Self> {
        which::which(binary_name).ok().map(Self::new)
    }

    /// Set the per-invocation deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path of the binary this converter runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    async fn run<I, S>(&self, args: I) -> crate::Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.binary_path);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(output) => output.map_err(|e| {
                crate::Error::ExternalTool(format!(
                    "Failed to execute {}: {}",
                    self.binary_path.display(),
                    e
                ))
            }),
            Err(_) => Err(ConversionError::Timeout {
                timeout: self.timeout,
            }
            .into()),
        }
    }
}

#[async_trait]
impl SbomConverter for CliConverter {
    async fn convert(
        &self,
        artifact: &Path,
        format: SbomFormat,
    ) -> crate::Result<serde_json::Value> {
        if !tokio::fs::try_exists(artifact).await.unwrap_or(false) {
            return Err(ConversionError::ArtifactMissing {
                path: artifact.to_path_buf(),
            }
            .into());
        }

        tracing::debug!(
            binary = %self.binary_path.display(),
            artifact = %artifact.display(),
            format = %format,
            "running converter"
        );

        let output = self
            .run([
                OsStr::new("convert"),
                artifact.as_os_str(),
                OsStr::new("-o"),
                OsStr::new(format.as_str()),
            ])
            .await?;

        parse_conversion_output(
            &output.stdout,
            &output.stderr,
            ExitStatus::from(output.status.success()),
            output.status.code(),
            format,
        )
    }

    async fn version(&self) -> crate::Result<String> {
        let version = self
            .version
            .get_or_try_init(|| async {
                let output = self.run(["--version"]).await?;
                if !output.status.success() {
                    return Err(crate::Error::ExternalTool(format!(
                        "{} --version exited with {:?}",
                        self.binary_path.display(),
                        output.status.code()
                    )));
                }
                parse_version_output(&output.stdout).ok_or_else(|| {
                    crate::Error::from(ConversionError::InvalidOutput {
                        format: "version".to_string(),
                        reason: "no version token in output".to_string(),
                    })
                })
            })
            .await?;

        Ok(version.clone())
    }

    fn capabilities(&self) -> ConverterCapabilities {
        ConverterCapabilities {
            can_convert: true,
            can_report_version: true,
        }
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}
