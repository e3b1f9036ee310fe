use crate::queue::JobId;
use thiserror::Error;

/// Reasons a delivered job cannot be processed at all.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("job {0} has no type")]
    MissingJobType(JobId),

    #[error("job {job} has an unexpected payload: {reason}")]
    UnexpectedPayload { job: JobId, reason: String },

    #[error("job {0} is missing its source type")]
    MissingSourceType(JobId),

    #[error("no client found for source '{0}'")]
    NoClientForSource(String),
}
