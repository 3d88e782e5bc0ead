//! Worker error types.

use thiserror::Error;

use crack_core::{Candidate, CodecError, JobId, TaskId};

/// A task that cannot be run as assigned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid candidate: {0}")]
    Codec(#[from] CodecError),

    #[error("candidate {candidate} has length {got}, the task needs {expected}")]
    LengthMismatch {
        candidate: Candidate,
        expected: usize,
        got: usize,
    },

    #[error("checkpoint {checkpoint} lies outside the task starting at {start}")]
    ResumeOutOfRange { start: Candidate, checkpoint: Candidate },
}

/// Reasons a task assignment is refused.
#[derive(Debug, Error)]
pub enum AssignError {
    #[error("task {job_id}/{task_id} is already running")]
    Duplicate { job_id: JobId, task_id: TaskId },

    #[error(transparent)]
    Invalid(#[from] EngineError),

    #[error("failed to start engine thread: {0}")]
    Thread(#[from] std::io::Error),

    #[error("worker has stopped")]
    Stopped,
}
