//! SBOM conversion through an external engine
//!
//! The core abstraction is the [`SbomConverter`] trait. Two implementations
//! are provided:
//!
//! - [`CliConverter`]: runs an engine binary (syft-compatible command line)
//! - [`UnavailableConverter`]: stub used when no binary can be found
//!
//! [`converter_from_config`] picks one the same way at every start-up:
//! explicit path first, then a PATH search, then the stub.

mod cli;
mod parser;
mod traits;
mod unavailable;

pub use cli::CliConverter;
pub use parser::{ExitStatus, parse_conversion_output, parse_version_output};
pub use traits::{ConverterCapabilities, SbomConverter};
pub use unavailable::UnavailableConverter;

use crate::config::ConverterConfig;
use crate::types::SbomFormat;
use std::sync::Arc;

/// Output format identifiers accepted by [`SbomConverter::convert`], in a fixed order
pub fn sbom_formats() -> Vec<&'static str> {
    SbomFormat::ALL.iter().map(|f| f.as_str()).collect()
}

/// Build the converter described by `config`
pub fn converter_from_config(config: &ConverterConfig) -> Arc<dyn SbomConverter> {
    let converter: Arc<dyn SbomConverter> = if let Some(ref path) = config.binary_path {
        // Use explicitly configured binary path
        Arc::new(CliConverter::new(path.clone()).with_timeout(config.timeout))
    } else if config.search_path {
        CliConverter::from_path(&config.binary_name)
            .map(|c| Arc::new(c.with_timeout(config.timeout)) as Arc<dyn SbomConverter>)
            .unwrap_or_else(|| {
                tracing::warn!(
                    binary = %config.binary_name,
                    "SBOM engine not found in PATH, conversions will fail"
                );
                Arc::new(UnavailableConverter)
            })
    } else {
        // No binary configured and PATH search disabled
        Arc::new(UnavailableConverter)
    };

    let caps = converter.capabilities();
    tracing::info!(
        converter = converter.name(),
        can_convert = caps.can_convert,
        "SBOM converter initialized"
    );

    converter
}
