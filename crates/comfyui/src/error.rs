//! Errors surfaced by the job client.

use zimage_core::error::CoreError;
use zimage_core::types::JobHandle;

use crate::job::JobState;

/// Errors from submitting, polling or downloading a job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The relay rejected the submission or answered without a job ID.
    #[error("Job submission failed: {0}")]
    SubmissionFailed(String),

    /// The attempt bound ran out before an artifact appeared.
    #[error("Timed out waiting for job {handle} after {attempts} polling attempts")]
    PollTimeout {
        handle: JobHandle,
        attempts: u32,
        /// Last history record seen for the job, for diagnostics.
        last_record: Option<serde_json::Value>,
    },

    /// The relay answered the artifact download with a non-2xx status.
    #[error("Artifact download failed: {0}")]
    DownloadFailed(String),

    /// The HTTP request itself failed (connection refused, DNS, timeout).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The job was cancelled by the caller.
    #[error("Job cancelled")]
    Cancelled,

    /// An operation was invoked out of order on a job runner.
    #[error("Cannot {operation} while job is {state}")]
    InvalidState {
        operation: &'static str,
        state: JobState,
    },

    /// Request validation or other domain error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl JobError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::SubmissionFailed(_) => "submission_failed",
            JobError::PollTimeout { .. } => "poll_timeout",
            JobError::DownloadFailed(_) => "download_failed",
            JobError::Transport(_) => "transport",
            JobError::Cancelled => "cancelled",
            JobError::InvalidState { .. } => "invalid_state",
            JobError::Core(CoreError::Validation(_)) => "validation",
        }
    }
}
