//! Status reconciliation against the dispatch system.
//!
//! The sweep only ever touches unfinished jobs that have a dispatch handle.
//! When the dispatcher has no record of a task, or reports it failed, the
//! job is closed with an error descriptor so `results.error` is always set.

use crate::error::{Error, ErrorDescriptor, Result};
use crate::types::{Event, JobId, Status, TaskHandle};

use super::SbomService;

/// Error code recorded when the dispatcher no longer knows a task
pub const TASK_LOST_CODE: &str = "task_lost";

/// Error code recorded when the dispatcher reports a task as failed
pub const TASK_FAILED_CODE: &str = "task_failed";

impl SbomService {
    /// Reconcile one job's status with the dispatcher's view of its task
    ///
    /// - Terminal jobs are left alone, whatever the dispatcher says.
    /// - Jobs without a dispatch handle were never scheduled and are left alone.
    /// - A task unknown to the dispatcher, or reported as `error`, closes the
    ///   job with `status = error` and an error descriptor.
    /// - Any other reported status is written if it moves the job forward,
    ///   except that a reported `complete` is recorded as `working`: only the
    ///   job's run writes `complete`, together with its results and digest.
    ///
    /// Closures by the sweep are provisional; a run that finishes afterwards
    /// replaces them with its real outcome.
    ///
    /// Returns the job's status after reconciliation.
    pub async fn check_status(&self, id: JobId) -> Result<Status> {
        let job = self
            .db
            .get_job(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", id)))?;

        let current = job.status();
        if current.is_terminal() {
            return Ok(current);
        }

        let Some(handle) = job.task_handle() else {
            return Ok(current);
        };

        let reported = self.dispatcher.status(&handle).await?;

        let changed = match reported {
            None => {
                let descriptor = ErrorDescriptor::new(
                    TASK_LOST_CODE,
                    format!("dispatch task {} has no status record", handle),
                );
                self.close_with_error(id, &handle, descriptor).await?
            }
            Some(Status::Error) => {
                let descriptor = ErrorDescriptor::new(
                    TASK_FAILED_CODE,
                    format!("dispatch task {} failed", handle),
                );
                self.close_with_error(id, &handle, descriptor).await?
            }
            Some(status) if status == current => false,
            Some(Status::Complete) => {
                // The outcome is only ever written by the job's own run
                tracing::debug!(job_id = %id, task = %handle, "task finished, outcome not recorded yet");
                self.db.reconcile_status(id, Status::Working).await?
            }
            Some(status) => self.db.reconcile_status(id, status).await?,
        };

        let after = if changed {
            let after = self
                .db
                .get_job(id)
                .await?
                .map(|job| job.status())
                .unwrap_or(current);

            tracing::info!(job_id = %id, task = %handle, from = %current, to = %after, "status reconciled");
            self.emit_event(Event::StatusReconciled {
                id,
                from: current,
                to: after,
            });
            after
        } else {
            current
        };

        Ok(after)
    }

    /// Run [`check_status`](Self::check_status) over every unfinished job
    ///
    /// A failure on one job is logged and does not stop the sweep. Returns
    /// how many jobs changed status.
    pub async fn check_statuses(&self) -> Result<usize> {
        let jobs = self.db.list_unfinished_jobs().await?;
        let mut changed = 0;

        for job in jobs {
            let id = JobId(job.id);
            let before = job.status();
            match self.check_status(id).await {
                Ok(after) if after != before => changed += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(job_id = %id, error = %e, "status check failed");
                }
            }
        }

        tracing::debug!(changed, "status sweep finished");
        Ok(changed)
    }

    /// Run the status sweep every `reconcile.interval` until shutdown
    pub fn start_reconciler(&self) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        let interval = self.config.reconcile.interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = service.shutdown_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                if let Err(e) = service.check_statuses().await {
                    tracing::error!(error = %e, "status sweep failed");
                }
            }

            tracing::info!("status reconciler stopped");
        })
    }

    async fn close_with_error(
        &self,
        id: JobId,
        handle: &TaskHandle,
        descriptor: ErrorDescriptor,
    ) -> Result<bool> {
        let written = self.db.close_job_by_sweep(id, &descriptor.to_value()).await?;
        if written {
            tracing::warn!(job_id = %id, task = %handle, code = %descriptor.code, "job closed by status sweep");
            self.emit_event(Event::JobFailed {
                id,
                error: descriptor.error,
            });
        }
        Ok(written)
    }
}
