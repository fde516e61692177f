//! Seams between the job service and the task-dispatch system

use crate::types::{JobId, Status, TaskHandle};
use async_trait::async_trait;

/// An asynchronous task-dispatch system
///
/// The service only relies on two things: a job can be enqueued, yielding
/// an opaque handle, and the live status of a handle can be queried later.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    /// Queue `job_id` for execution and return the task handle
    ///
    /// # Errors
    ///
    /// Returns `Error::ShuttingDown` once the dispatcher stopped accepting
    /// work, or `Error::Dispatch` when the queue is gone.
    async fn enqueue(&self, job_id: JobId) -> crate::Result<TaskHandle>;

    /// Live status of a task
    ///
    /// `Ok(None)` means the dispatcher has no record of the handle (never
    /// issued, expired or lost).
    async fn status(&self, handle: &TaskHandle) -> crate::Result<Option<Status>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Executes a job on behalf of a dispatcher worker
#[async_trait]
pub trait JobPerformer: Send + Sync {
    /// Run the job to completion
    ///
    /// `Err` means the job could not even record its own outcome; the
    /// dispatcher then reports the task as failed.
    async fn perform(&self, job_id: JobId) -> crate::Result<()>;
}
