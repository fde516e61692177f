//! Job record CRUD and guarded status transitions.
//!
//! Every status write is conditional on the row still being unfinished, so a
//! terminal job can never be moved again regardless of which writer arrives last.
//! The one exception is a row closed by the status sweep: the job's own
//! outcome (`complete_job` / `fail_job`) still replaces that closure once.

use crate::error::DatabaseError;
use crate::types::{JobId, Status, TaskHandle};
use crate::{Error, Result};

use super::{Database, Job, NewJob};

const JOB_COLUMNS: &str = r#"
    id, url, status, format, dispatch_task_id, sha256, results, ip,
    created_at, updated_at, completed_at, sweep_closed
"#;

impl Database {
    /// Insert a new job record in the `queued` state
    pub async fn insert_job(&self, job: &NewJob) -> Result<JobId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO jobs (url, status, format, ip, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.url)
        .bind(Status::Queued.to_i32())
        .bind(&job.format)
        .bind(&job.ip)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert job: {}",
                e
            )))
        })?;

        Ok(JobId(result.last_insert_rowid()))
    }

    /// Get a job by ID
    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, Job>(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get job: {}",
                    e
                )))
            })?;

        Ok(row)
    }

    /// List all jobs, newest first
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        let rows =
            sqlx::query_as::<_, Job>(&format!("SELECT {} FROM jobs ORDER BY id DESC", JOB_COLUMNS))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to list jobs: {}",
                        e
                    )))
                })?;

        Ok(rows)
    }

    /// List jobs with a specific status, oldest first
    pub async fn list_jobs_by_status(&self, status: Status) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, Job>(&format!(
            "SELECT {} FROM jobs WHERE status = ? ORDER BY id ASC",
            JOB_COLUMNS
        ))
        .bind(status.to_i32())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list jobs by status: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// List jobs that are still `queued` or `working`, oldest first
    pub async fn list_unfinished_jobs(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, Job>(&format!(
            "SELECT {} FROM jobs WHERE status IN (?, ?) ORDER BY id ASC",
            JOB_COLUMNS
        ))
        .bind(Status::Queued.to_i32())
        .bind(Status::Working.to_i32())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list unfinished jobs: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Record the dispatch handle returned when the job was scheduled
    pub async fn set_dispatch_task_id(&self, id: JobId, handle: &TaskHandle) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("UPDATE jobs SET dispatch_task_id = ?, updated_at = ? WHERE id = ?")
            .bind(handle.as_str())
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to set dispatch task id: {}",
                    e
                )))
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "job {}",
                id
            ))));
        }

        Ok(())
    }

    /// Overwrite the status of an unfinished job with a status observed elsewhere
    ///
    /// The write only lands when the job is still `queued`/`working` and the new
    /// status is not behind the current one. Returns whether a row changed.
    pub async fn reconcile_status(&self, id: JobId, status: Status) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let completed_at = status.is_terminal().then_some(now);

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, updated_at = ?, completed_at = COALESCE(?, completed_at)
            WHERE id = ? AND status IN (?, ?) AND status < ?
            "#,
        )
        .bind(status.to_i32())
        .bind(now)
        .bind(completed_at)
        .bind(id)
        .bind(Status::Queued.to_i32())
        .bind(Status::Working.to_i32())
        .bind(status.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to reconcile status: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a successful conversion
    ///
    /// `results`, `sha256` and `status = complete` are written in one statement.
    /// Returns `false` when the job already has an outcome; a closure by the
    /// status sweep is overwritten.
    pub async fn complete_job(
        &self,
        id: JobId,
        results: &serde_json::Value,
        sha256: &str,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let results = serde_json::to_string(results)?;

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, results = ?, sha256 = ?, updated_at = ?, completed_at = ?,
                sweep_closed = 0
            WHERE id = ? AND (status IN (?, ?) OR sweep_closed = 1)
            "#,
        )
        .bind(Status::Complete.to_i32())
        .bind(results)
        .bind(sha256)
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(Status::Queued.to_i32())
        .bind(Status::Working.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to complete job: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a failed job with its error descriptor
    ///
    /// `sha256` is only passed when the artifact had been downloaded before the
    /// failure. Returns `false` when the job already has an outcome; a closure
    /// by the status sweep is overwritten.
    pub async fn fail_job(
        &self,
        id: JobId,
        results: &serde_json::Value,
        sha256: Option<&str>,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let results = serde_json::to_string(results)?;

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, results = ?, sha256 = COALESCE(?, sha256), updated_at = ?,
                completed_at = ?, sweep_closed = 0
            WHERE id = ? AND (status IN (?, ?) OR sweep_closed = 1)
            "#,
        )
        .bind(Status::Error.to_i32())
        .bind(results)
        .bind(sha256)
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(Status::Queued.to_i32())
        .bind(Status::Working.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record job failure: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Close an unfinished job on behalf of the status sweep
    ///
    /// Writes `status = error` with `results` and marks the row so the job's
    /// own outcome can still replace it. Returns `false` when the job was
    /// already terminal.
    pub async fn close_job_by_sweep(&self, id: JobId, results: &serde_json::Value) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let results = serde_json::to_string(results)?;

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, results = ?, updated_at = ?, completed_at = ?, sweep_closed = 1
            WHERE id = ? AND status IN (?, ?)
            "#,
        )
        .bind(Status::Error.to_i32())
        .bind(results)
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(Status::Queued.to_i32())
        .bind(Status::Working.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to close job: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Count jobs per status
    pub async fn count_jobs_by_status(&self, status: Status) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.to_i32())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count jobs: {}",
                    e
                )))
            })?;

        Ok(count)
    }
}
