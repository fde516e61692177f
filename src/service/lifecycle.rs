//! Shutdown coordination and statistics.

use crate::error::Result;
use crate::types::{Event, JobStats, Status};
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::SbomService;

/// How long shutdown waits for running jobs
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

impl SbomService {
    /// Gracefully shut down the service
    ///
    /// 1. Stops accepting new jobs
    /// 2. Stops the status reconciler
    /// 3. Waits up to 30 seconds for running jobs (in-process dispatcher only)
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Jobs still queued or interrupted stay unfinished in the database; the
    /// next status sweep closes them as lost once their tasks are gone.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        self.shutdown_token.cancel();

        if let Some(local) = &self.local_dispatcher {
            local.shutdown(SHUTDOWN_GRACE).await;
        }

        self.emit_event(Event::Shutdown);

        // The pool closes when the last clone of the service is dropped
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether the service still accepts new jobs
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    /// Job counts per status
    pub async fn stats(&self) -> Result<JobStats> {
        Ok(JobStats {
            queued: self.db.count_jobs_by_status(Status::Queued).await?,
            working: self.db.count_jobs_by_status(Status::Working).await?,
            complete: self.db.count_jobs_by_status(Status::Complete).await?,
            error: self.db.count_jobs_by_status(Status::Error).await?,
        })
    }
}
