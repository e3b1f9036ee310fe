//! Persisted work queue
//!
//! [`JobQueue`] is the contract the crawler relies on: duplicate suppression
//! for pending work, deferred delivery through `run_after`, and a recurring
//! trigger that hands due jobs to a single [`JobHandler`] one at a time.
//! [`LocalQueue`] implements it on top of a JSON document in the state
//! directory.

mod job;
mod local;
mod lock;

pub use job::{Job, JobId, JobKind, JobPayload, JobState, NAME_KEY, NewJob, OWNER_KEY, SOURCE_KEY, TYPE_KEY};
pub use local::{LocalQueue, QueueSettings};

use crate::schedule::Schedule;
use core::time::Duration;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// An equal payload is already pending under the given id.
    #[error("an equivalent job is already pending as job {0}")]
    Duplicate(JobId),

    #[error("the queue has been shut down")]
    Closed,

    #[error("{0}")]
    Storage(ohno::AppError),
}

/// Processes jobs delivered by a [`JobQueue`].
pub trait JobHandler: Send + Sync + 'static {
    fn handle(&self, job: &Job) -> impl Future<Output = crate::Result<()>> + Send;
}

pub trait JobQueue: Send + Sync {
    /// Add a job, rejecting it with [`QueueError::Duplicate`] when an equal payload is pending.
    fn enqueue(&self, job: NewJob) -> impl Future<Output = Result<JobId, QueueError>> + Send;

    /// Deliver due jobs to `handler` every time `schedule` fires.
    fn start_recurring<H: JobHandler>(&self, schedule: &Schedule, handler: Arc<H>) -> crate::Result<()>;

    /// Stop firing and wait up to `grace` for the in-flight delivery to finish.
    fn shutdown(&self, grace: Duration) -> impl Future<Output = ()> + Send;
}
