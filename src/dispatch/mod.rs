//! Asynchronous task dispatch
//!
//! [`TaskDispatcher`] is the boundary to whatever runs jobs; the service
//! schedules through it and the status sweep polls it. [`LocalDispatcher`]
//! is the in-process implementation: a work channel drained by a bounded
//! pool of tokio tasks, with per-task status kept for a limited time after
//! the task finishes.

mod local;
mod traits;

pub use local::LocalDispatcher;
pub use traits::{JobPerformer, TaskDispatcher};
