//! Stand-in converter for hosts without an SBOM engine

use super::traits::{ConverterCapabilities, SbomConverter};
use crate::types::SbomFormat;
use async_trait::async_trait;
use std::path::Path;

/// Converter used when no engine binary is available or configured
///
/// Every operation returns `Error::NotSupported`, so jobs still reach a
/// terminal `error` status with a readable descriptor instead of hanging.
///
/// # Examples
///
/// ```
/// use sbom_convert::converter::{SbomConverter, UnavailableConverter};
/// use sbom_convert::SbomFormat;
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() {
/// let converter = UnavailableConverter;
/// assert!(!converter.capabilities().can_convert);
/// assert!(converter.convert(Path::new("bom.json"), SbomFormat::SpdxJson).await.is_err());
/// # }
/// ```
pub struct UnavailableConverter;

#[async_trait]
impl SbomConverter for UnavailableConverter {
    async fn convert(
        &self,
        _artifact: &Path,
        _format: SbomFormat,
    ) -> crate::Result<serde_json::Value> {
        Err(crate::Error::NotSupported(
            "SBOM conversion requires an external engine binary. \
             Configure converter.binary_path or ensure it is in PATH."
                .into(),
        ))
    }

    async fn version(&self) -> crate::Result<String> {
        Err(crate::Error::NotSupported(
            "no SBOM engine binary available".into(),
        ))
    }

    fn capabilities(&self) -> ConverterCapabilities {
        ConverterCapabilities {
            can_convert: false,
            can_report_version: false,
        }
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}
