use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failure reported by a [`SourceClient`](super::SourceClient).
#[derive(Debug, Error)]
pub enum SourceError {
    /// The requested resource does not exist or is not visible to us.
    #[error("not found: {0}")]
    NotFound(String),

    /// The platform refused the request until the quota resets.
    #[error("rate limited until {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("{0}")]
    Transport(ohno::AppError),
}

impl SourceError {
    pub(crate) fn transport(e: impl Into<ohno::AppError>) -> Self {
        Self::Transport(e.into())
    }
}
