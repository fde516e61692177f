//! Traits and types for SBOM conversion

use crate::types::SbomFormat;
use async_trait::async_trait;
use std::path::Path;

/// Capabilities of a converter implementation
#[derive(Debug, Clone, Copy)]
pub struct ConverterCapabilities {
    /// Can produce SBOM documents
    pub can_convert: bool,
    /// Can report the engine version
    pub can_report_version: bool,
}

/// Trait for the external SBOM conversion engine
///
/// Implementations can shell out to a binary, or provide stub functionality
/// for graceful degradation when no engine is installed. Tests substitute
/// in-memory fakes.
///
/// # Examples
///
/// ```no_run
/// use sbom_convert::converter::{CliConverter, SbomConverter};
/// use sbom_convert::SbomFormat;
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = CliConverter::from_path("syft").expect("syft binary not found");
///
/// println!("engine version {}", converter.version().await?);
/// let document = converter
///     .convert(Path::new("bom.json"), SbomFormat::SpdxJson)
///     .await?;
/// println!("{}", document);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait SbomConverter: Send + Sync {
    /// Convert the artifact at `artifact` into `format`
    ///
    /// JSON formats come back as a parsed document, text formats as a JSON
    /// string holding the converter's output.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The artifact does not exist
    /// - The engine cannot be launched, exits non-zero or misses its deadline
    /// - The output is empty or not valid for the requested format
    /// - Conversion is not supported (for stub implementations)
    async fn convert(&self, artifact: &Path, format: SbomFormat)
    -> crate::Result<serde_json::Value>;

    /// Version string reported by the engine
    ///
    /// Implementations may cache the answer for their own lifetime.
    async fn version(&self) -> crate::Result<String>;

    /// Query capabilities of this converter
    fn capabilities(&self) -> ConverterCapabilities;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
