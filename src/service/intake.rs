//! Job creation, scheduling and queries.

use crate::db::NewJob;
use crate::error::{Error, ErrorDescriptor, Result};
use crate::types::{Event, JobId, JobInfo, JobOptions, Status, TaskHandle};
use std::sync::atomic::Ordering;

use super::SbomService;

impl SbomService {
    /// Create a job for `url` in the `queued` state
    ///
    /// The job is not scheduled; call [`schedule_job`](Self::schedule_job)
    /// or use [`submit`](Self::submit) to do both.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidUrl` if the URL is empty, unparsable or not HTTP(S)
    /// - `Error::ShuttingDown` once shutdown has started
    pub async fn create_job(&self, url: &str, options: JobOptions) -> Result<JobId> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let url = validate_url(url)?;
        let format = options
            .format
            .unwrap_or(self.config.converter.default_format);

        let id = self
            .db
            .insert_job(&NewJob {
                url: url.clone(),
                format: format.as_str().to_string(),
                ip: options.ip,
            })
            .await?;

        tracing::info!(job_id = %id, url = %url, format = %format, "job created");
        self.emit_event(Event::JobCreated { id, url });

        Ok(id)
    }

    /// Hand a job to the dispatch system and record the returned handle
    ///
    /// Scheduling an already scheduled job returns its existing handle.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the job doesn't exist
    /// - `Error::Dispatch` if the job already finished without ever being scheduled
    /// - any error the dispatcher returns
    pub async fn schedule_job(&self, id: JobId) -> Result<TaskHandle> {
        let job = self
            .db
            .get_job(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", id)))?;

        if let Some(handle) = job.task_handle() {
            tracing::debug!(job_id = %id, task = %handle, "job already scheduled");
            return Ok(handle);
        }

        if job.is_finished() {
            return Err(Error::Dispatch(format!(
                "job {} is already {}",
                id,
                job.status()
            )));
        }

        let handle = self.dispatcher.enqueue(id).await?;
        self.db.set_dispatch_task_id(id, &handle).await?;

        tracing::info!(job_id = %id, task = %handle, dispatcher = self.dispatcher.name(), "job scheduled");
        self.emit_event(Event::JobScheduled {
            id,
            task: handle.clone(),
        });

        Ok(handle)
    }

    /// Create and schedule a job in one call
    ///
    /// If scheduling fails the new job is closed with an error descriptor so
    /// it never lingers unscheduled.
    pub async fn submit(&self, url: &str, options: JobOptions) -> Result<(JobId, TaskHandle)> {
        let id = self.create_job(url, options).await?;

        match self.schedule_job(id).await {
            Ok(handle) => Ok((id, handle)),
            Err(e) => {
                let descriptor = ErrorDescriptor::from(&e);
                if let Err(write_err) = self.db.fail_job(id, &descriptor.to_value(), None).await {
                    tracing::error!(job_id = %id, error = %write_err, "failed to record scheduling failure");
                }
                self.emit_event(Event::JobFailed {
                    id,
                    error: descriptor.error,
                });
                Err(e)
            }
        }
    }

    /// Get a job by ID
    pub async fn get_job(&self, id: JobId) -> Result<JobInfo> {
        let job = self
            .db
            .get_job(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", id)))?;
        JobInfo::try_from(job)
    }

    /// List all jobs, newest first
    pub async fn list_jobs(&self) -> Result<Vec<JobInfo>> {
        self.db
            .list_jobs()
            .await?
            .into_iter()
            .map(JobInfo::try_from)
            .collect()
    }

    /// List jobs with the given status, oldest first
    pub async fn list_jobs_by_status(&self, status: Status) -> Result<Vec<JobInfo>> {
        self.db
            .list_jobs_by_status(status)
            .await?
            .into_iter()
            .map(JobInfo::try_from)
            .collect()
    }
}

/// Check that `url` is a fetchable absolute HTTP(S) URL
pub(crate) fn validate_url(url: &str) -> Result<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("URL must not be empty".into()));
    }

    let parsed =
        url::Url::parse(trimmed).map_err(|e| Error::InvalidUrl(format!("{}: {}", trimmed, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl(format!(
            "{}: only http and https URLs are supported",
            trimmed
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl(format!("{}: missing host", trimmed)));
    }

    Ok(trimmed.to_string())
}
