//! Interpretation of converter process output

use crate::error::ConversionError;
use crate::types::SbomFormat;
use regex::Regex;
use std::str;
use std::sync::OnceLock;

/// Longest stderr excerpt kept in an error descriptor
const MAX_STDERR_CHARS: usize = 2000;

/// Exit status of an external command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The command exited successfully (exit code 0)
    Success,
    /// The command exited with a non-zero exit code or was killed
    Failure,
}

impl ExitStatus {
    /// Returns `true` if the exit status represents success
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<bool> for ExitStatus {
    fn from(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Turn the output of `<bin> convert <path> -o <format>` into a result payload
///
/// stdout is the payload on success. JSON formats must parse as JSON; text
/// formats are kept verbatim as a JSON string.
pub fn parse_conversion_output(
    stdout: &[u8],
    stderr: &[u8],
    exit_status: ExitStatus,
    exit_code: Option<i32>,
    format: SbomFormat,
) -> crate::Result<serde_json::Value> {
    if !exit_status.is_success() {
        return Err(ConversionError::ExitFailure {
            format: format.to_string(),
            code: exit_code,
            stderr: excerpt(&String::from_utf8_lossy(stderr)),
        }
        .into());
    }

    let output = str::from_utf8(stdout).map_err(|e| ConversionError::InvalidOutput {
        format: format.to_string(),
        reason: format!("output is not UTF-8: {}", e),
    })?;

    if output.trim().is_empty() {
        return Err(ConversionError::InvalidOutput {
            format: format.to_string(),
            reason: "converter produced no output".to_string(),
        }
        .into());
    }

    if format.is_json() {
        serde_json::from_str(output).map_err(|e| {
            ConversionError::InvalidOutput {
                format: format.to_string(),
                reason: format!("output is not valid JSON: {}", e),
            }
            .into()
        })
    } else {
        Ok(serde_json::Value::String(output.to_string()))
    }
}

/// Extract the version token from `<bin> --version` output
///
/// Prefers the first semver-looking token (`syft 1.4.1` -> `1.4.1`); falls
/// back to the last word of the first non-empty line.
pub fn parse_version_output(stdout: &[u8]) -> Option<String> {
    static SEMVER: OnceLock<Option<Regex>> = OnceLock::new();

    let output = String::from_utf8_lossy(stdout);
    let semver = SEMVER.get_or_init(|| {
        Regex::new(r"v?(\d+\.\d+\.\d+(?:[-+][0-9A-Za-z.+-]+)?)").ok()
    });

    if let Some(re) = semver
        && let Some(caps) = re.captures(&output)
        && let Some(version) = caps.get(1)
    {
        return Some(version.as_str().to_string());
    }

    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
}

fn excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.chars().count() <= MAX_STDERR_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(MAX_STDERR_CHARS).collect();
    cut.push_str("...");
    cut
}
