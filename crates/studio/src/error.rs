use thiserror::Error;

use crate::media::UploadSlot;

/// Errors raised by trim and job operations.
///
/// None of these are fatal to the studio: each one is scoped to a single trim
/// operation or a single job, and the caller may retry with corrected input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StudioError {
    #[error("Invalid media duration: {0} (must be finite and greater than zero)")]
    InvalidDuration(f64),

    #[error("Trim range {start:.3}s - {end:.3}s is narrower than the 0.1s minimum")]
    RangeTooNarrow { start: f64, end: f64 },

    #[error("Invalid trim range: start {start:.3}s, end {end:.3}s")]
    InvalidRange { start: f64, end: f64 },

    #[error("Missing {0} input")]
    MissingInput(UploadSlot),

    #[error("Unsupported media kind: {0}")]
    UnsupportedKind(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Studio event loop is no longer running")]
    LoopClosed,
}

impl StudioError {
    pub fn unsupported_kind(what: impl Into<String>) -> Self {
        Self::UnsupportedKind(what.into())
    }

    pub fn job_not_found(id: impl Into<String>) -> Self {
        Self::JobNotFound(id.into())
    }
}

/// Result type for studio operations
pub type Result<T> = std::result::Result<T, StudioError>;
