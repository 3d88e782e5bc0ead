//! Scheduler error types.

use thiserror::Error;

use crack_core::{JobId, ValidationError};

use crate::jobs::TaskKey;

/// Errors that can occur during scheduling operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A job's running-task counter left its legal range. The scheduler
    /// state can no longer be trusted and the loop stops.
    #[error("running-task accounting broken for job {job_id}: {detail}")]
    Accounting { job_id: JobId, detail: String },

    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("task not found: {0}")]
    TaskNotFound(TaskKey),

    #[error("invalid job: {0}")]
    Invalid(#[from] ValidationError),

    #[error("controller has stopped")]
    Stopped,
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
