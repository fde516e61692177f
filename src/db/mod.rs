//! Database layer for sbom-convert
//!
//! Handles SQLite persistence for job records.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`jobs`]: Job record CRUD and guarded status transitions

use crate::error::Error;
use crate::types::{JobId, JobInfo, SbomFormat, Status, TaskHandle};
use sqlx::{FromRow, sqlite::SqlitePool};

mod jobs;
mod migrations;

/// New job to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Source URL of the artifact
    pub url: String,
    /// Requested output format identifier
    pub format: String,
    /// Requester address
    pub ip: Option<String>,
}

/// Job record from database
#[derive(Debug, Clone, FromRow)]
pub struct Job {
    /// Unique database ID (AUTOINCREMENT, never reused)
    pub id: i64,
    /// Source URL of the artifact
    pub url: String,
    /// Current status code (0=queued, 1=working, 2=complete, 3=error)
    pub status: i32,
    /// Requested output format identifier
    pub format: String,
    /// Dispatch handle, NULL until the job is scheduled
    pub dispatch_task_id: Option<String>,
    /// SHA-256 of the downloaded artifact
    pub sha256: Option<String>,
    /// JSON-encoded result payload
    pub results: Option<String>,
    /// Requester address
    pub ip: Option<String>,
    /// Unix timestamp when the job was created
    pub created_at: i64,
    /// Unix timestamp of the last status change
    pub updated_at: i64,
    /// Unix timestamp when the job reached a terminal status
    pub completed_at: Option<i64>,
    /// Set when the status sweep closed the job rather than its own run
    pub sweep_closed: bool,
}

impl Job {
    /// Typed status
    pub fn status(&self) -> Status {
        Status::from_i32(self.status)
    }

    /// Whether the job reached `complete` or `error`
    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Whether the job's own run recorded its outcome
    ///
    /// A job closed by the status sweep is finished but has no outcome yet;
    /// a late run may still replace the sweep's error.
    pub fn has_outcome(&self) -> bool {
        self.is_finished() && !self.sweep_closed
    }

    /// Dispatch handle, treating an empty string like NULL
    pub fn task_handle(&self) -> Option<TaskHandle> {
        self.dispatch_task_id
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .map(|h| TaskHandle(h.to_string()))
    }

    /// Decoded result payload
    pub fn results_value(&self) -> crate::Result<Option<serde_json::Value>> {
        self.results
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(Error::from)
    }
}

impl TryFrom<Job> for JobInfo {
    type Error = Error;

    fn try_from(job: Job) -> Result<Self, Self::Error> {
        use chrono::{TimeZone, Utc};

        let results = job.results_value()?;
        let format: SbomFormat = job.format.parse()?;

        Ok(JobInfo {
            id: JobId(job.id),
            status: job.status(),
            dispatch_task_id: job.task_handle(),
            url: job.url,
            format,
            sha256: job.sha256,
            results,
            ip: job.ip,
            created_at: Utc
                .timestamp_opt(job.created_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
            completed_at: job
                .completed_at
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        })
    }
}

/// Database handle for sbom-convert
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
