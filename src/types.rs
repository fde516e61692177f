//! Core types for sbom-convert

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a conversion job
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<JobId> for i64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for JobId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for JobId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for JobId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for JobId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Job status
///
/// Jobs move `Queued → Working → {Complete, Error}`; the last two are terminal.
/// The integer codes are ordered so that a later state always has a larger code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Created, waiting for a worker
    Queued,
    /// A worker is downloading or converting
    Working,
    /// Conversion finished, results recorded
    Complete,
    /// Conversion failed, error descriptor recorded
    Error,
}

impl Status {
    /// Convert integer status code to Status enum
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => Status::Queued,
            1 => Status::Working,
            2 => Status::Complete,
            3 => Status::Error,
            _ => Status::Error, // Default to Error for unknown status
        }
    }

    /// Convert Status enum to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            Status::Queued => 0,
            Status::Working => 1,
            Status::Complete => 2,
            Status::Error => 3,
        }
    }

    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Queued => "queued",
            Status::Working => "working",
            Status::Complete => "complete",
            Status::Error => "error",
        }
    }

    /// `Complete` and `Error` never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Complete | Status::Error)
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic
    pub fn can_transition_to(&self, next: Status) -> bool {
        !self.is_terminal() && next >= *self
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Status::Queued),
            "working" => Ok(Status::Working),
            "complete" => Ok(Status::Complete),
            "error" => Ok(Status::Error),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// Output formats the converter can produce
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SbomFormat {
    /// CycloneDX JSON
    #[default]
    #[serde(rename = "cyclonedx-json")]
    CycloneDxJson,
    /// CycloneDX XML
    #[serde(rename = "cyclonedx-xml")]
    CycloneDxXml,
    /// GitHub dependency snapshot JSON
    #[serde(rename = "github-json")]
    GithubJson,
    /// SPDX JSON
    #[serde(rename = "spdx-json")]
    SpdxJson,
    /// SPDX tag-value
    #[serde(rename = "spdx-tag-value")]
    SpdxTagValue,
    /// Syft native JSON
    #[serde(rename = "syft-json")]
    SyftJson,
    /// Syft columnar table
    #[serde(rename = "syft-table")]
    SyftTable,
    /// Syft plain text
    #[serde(rename = "syft-text")]
    SyftText,
}

impl SbomFormat {
    /// Every supported format, in a fixed order
    pub const ALL: [SbomFormat; 8] = [
        SbomFormat::CycloneDxJson,
        SbomFormat::CycloneDxXml,
        SbomFormat::GithubJson,
        SbomFormat::SpdxJson,
        SbomFormat::SpdxTagValue,
        SbomFormat::SyftJson,
        SbomFormat::SyftTable,
        SbomFormat::SyftText,
    ];

    /// Identifier passed to the converter's `-o` flag
    pub fn as_str(&self) -> &'static str {
        match self {
            SbomFormat::CycloneDxJson => "cyclonedx-json",
            SbomFormat::CycloneDxXml => "cyclonedx-xml",
            SbomFormat::GithubJson => "github-json",
            SbomFormat::SpdxJson => "spdx-json",
            SbomFormat::SpdxTagValue => "spdx-tag-value",
            SbomFormat::SyftJson => "syft-json",
            SbomFormat::SyftTable => "syft-table",
            SbomFormat::SyftText => "syft-text",
        }
    }

    /// Whether converter output in this format is a JSON document
    pub fn is_json(&self) -> bool {
        matches!(
            self,
            SbomFormat::CycloneDxJson
                | SbomFormat::GithubJson
                | SbomFormat::SpdxJson
                | SbomFormat::SyftJson
        )
    }
}

impl std::fmt::Display for SbomFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SbomFormat {
    type Err = crate::error::ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SbomFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| crate::error::ConversionError::UnsupportedFormat(s.to_string()))
    }
}

/// Opaque handle correlating a job with its unit of work in the dispatch system
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(pub String);

impl TaskHandle {
    /// Borrow the handle as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskHandle {
    fn from(handle: String) -> Self {
        Self(handle)
    }
}

/// Options accepted when a job is created
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JobOptions {
    /// Requested output format (falls back to the configured default)
    #[serde(default)]
    pub format: Option<SbomFormat>,

    /// Requester address, kept as metadata only
    #[serde(default)]
    pub ip: Option<String>,
}

/// A conversion job as seen by clients
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobInfo {
    /// Job ID
    pub id: JobId,
    /// Source URL of the artifact
    pub url: String,
    /// Current status
    pub status: Status,
    /// Requested output format
    pub format: SbomFormat,
    /// Dispatch handle, `None` until scheduled
    pub dispatch_task_id: Option<TaskHandle>,
    /// SHA-256 of the downloaded artifact (lowercase hex)
    pub sha256: Option<String>,
    /// SBOM document, skip marker or error descriptor
    pub results: Option<serde_json::Value>,
    /// Requester address
    pub ip: Option<String>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
}

/// Capabilities of the configured converter
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Capabilities {
    /// Converter implementation name
    pub converter: String,
    /// Whether a converter binary is available at all
    pub can_convert: bool,
    /// Whether archives are handed to the converter instead of being skipped
    pub converts_archives: bool,
    /// Output formats that may be requested
    pub formats: Vec<SbomFormat>,
}

/// Job counts per status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    /// Jobs waiting for a worker
    pub queued: i64,
    /// Jobs being downloaded or converted
    pub working: i64,
    /// Jobs with a recorded SBOM
    pub complete: i64,
    /// Jobs with a recorded error
    pub error: i64,
}

impl JobStats {
    /// Jobs that have not reached a terminal status
    pub fn unfinished(&self) -> i64 {
        self.queued + self.working
    }
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job record created
    JobCreated {
        /// Job ID
        id: JobId,
        /// Source URL
        url: String,
    },

    /// Job handed to the dispatch system
    JobScheduled {
        /// Job ID
        id: JobId,
        /// Dispatch handle
        task: TaskHandle,
    },

    /// A worker started running the job
    JobStarted {
        /// Job ID
        id: JobId,
    },

    /// Job finished successfully
    JobCompleted {
        /// Job ID
        id: JobId,
        /// Artifact digest
        sha256: String,
        /// Whether conversion was skipped for an unsupported artifact
        skipped: bool,
    },

    /// Job failed
    JobFailed {
        /// Job ID
        id: JobId,
        /// Error message
        error: String,
    },

    /// Status sweep changed a job's status
    StatusReconciled {
        /// Job ID
        id: JobId,
        /// Status before the sweep
        from: Status,
        /// Status after the sweep
        to: Status,
    },

    /// Service is shutting down
    Shutdown,
}
