//! Jobs and the tasks they are split into.

use std::collections::BTreeMap;
use std::fmt;

use num_bigint::BigUint;

use crack_core::partition::{check_task_count, chunk_size_for, split};
use crack_core::{
    Candidate, JobId, JobRequest, JobSummary, TaskAssignment, TaskId, TaskSummary,
    ValidationError,
};

use crate::error::{SchedulerError, SchedulerResult};

/// Identity of a task across the whole controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    pub job_id: JobId,
    pub task_id: TaskId,
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.job_id, self.task_id)
    }
}

/// One contiguous slice of a job's candidate space.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub key: TaskKey,
    pub start: Candidate,
    pub len: BigUint,
    /// Next unchecked candidate, as last reported by a worker.
    pub checkpoint: Option<Candidate>,
}

impl Task {
    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            job_id: self.key.job_id,
            task_id: self.key.task_id,
            start: self.start.clone(),
            task_len: self.len.clone(),
            checkpoint: self.checkpoint.clone(),
        }
    }
}

/// A submitted job and its outstanding tasks.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub request: JobRequest,
    pub max_concurrent_tasks: u32,
    running_tasks: u32,
    /// Outstanding tasks; finished ones are removed.
    tasks: BTreeMap<TaskId, Task>,
    pub created_at: u64,
    pub finished_at: Option<u64>,
    pub password: Option<String>,
    pub cancelled: bool,
}

impl Job {
    /// Validate `request` and split it into tasks of `task_budget` raw
    /// hash iterations each.
    pub fn new(
        id: JobId,
        request: JobRequest,
        default_max_concurrent: u32,
        task_budget: u64,
        now: u64,
    ) -> Result<Self, ValidationError> {
        request.validate()?;

        let chunk_size = BigUint::from(chunk_size_for(task_budget, request.iterations)?);
        check_task_count(request.alphabet, request.key_len, &chunk_size)?;
        let chunks = split(request.alphabet, request.key_len, &chunk_size)?;

        let tasks = chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let task_id = i as TaskId;
                let task = Task {
                    key: TaskKey { job_id: id, task_id },
                    start: chunk.start,
                    len: chunk.len,
                    checkpoint: None,
                };
                (task_id, task)
            })
            .collect();

        Ok(Self {
            id,
            max_concurrent_tasks: request
                .max_concurrent_tasks
                .unwrap_or(default_max_concurrent)
                .max(1),
            request,
            running_tasks: 0,
            tasks,
            created_at: now,
            finished_at: None,
            password: None,
            cancelled: false,
        })
    }

    pub fn running_tasks(&self) -> u32 {
        self.running_tasks
    }

    /// Whether another task of this job may be assigned.
    pub fn has_capacity(&self) -> bool {
        self.running_tasks < self.max_concurrent_tasks
    }

    pub fn increase_running(&mut self) -> SchedulerResult<()> {
        let limit = self.tasks.len().min(self.max_concurrent_tasks as usize);
        if self.running_tasks as usize >= limit {
            return Err(SchedulerError::Accounting {
                job_id: self.id,
                detail: format!(
                    "cannot run more than {limit} tasks ({} outstanding, cap {})",
                    self.tasks.len(),
                    self.max_concurrent_tasks
                ),
            });
        }
        self.running_tasks += 1;
        Ok(())
    }

    pub fn decrease_running(&mut self) -> SchedulerResult<()> {
        if self.running_tasks == 0 {
            return Err(SchedulerError::Accounting {
                job_id: self.id,
                detail: "running task count would drop below zero".to_string(),
            });
        }
        self.running_tasks -= 1;
        Ok(())
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    pub fn task_mut(&mut self, task_id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&task_id)
    }

    pub fn remove_task(&mut self, task_id: TaskId) -> Option<Task> {
        self.tasks.remove(&task_id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Drop every outstanding task and stamp the job as finished.
    pub fn finish(&mut self, password: Option<String>, cancelled: bool, now: u64) {
        self.tasks.clear();
        self.password = password;
        self.cancelled = cancelled;
        self.finished_at = Some(now);
    }

    /// The document pushed to a worker for one of this job's tasks.
    pub fn assignment(&self, task_id: TaskId) -> Option<TaskAssignment> {
        let task = self.tasks.get(&task_id)?;
        let r = &self.request;
        Some(TaskAssignment {
            job_id: self.id,
            task_id,
            salt: r.salt.clone(),
            digest: r.digest.clone(),
            key_len: r.key_len,
            iterations: r.iterations,
            alphabet: r.alphabet,
            algorithm: r.algorithm,
            start: task.start.clone(),
            task_len: task.len.clone(),
            checkpoint: task.checkpoint.clone(),
        })
    }

    /// Whether `candidate` can be a checkpoint of task `task_id`: a
    /// candidate of the job's alphabet and length whose index lies in
    /// `[start, start + len]`. The upper end is the exhausted position.
    pub fn accepts_checkpoint(&self, task_id: TaskId, candidate: &Candidate) -> bool {
        let alphabet = self.request.alphabet;
        if candidate.len() != self.request.key_len {
            return false;
        }
        let Some(task) = self.tasks.get(&task_id) else {
            return false;
        };
        match (alphabet.to_index(&task.start), alphabet.to_index(candidate)) {
            (Ok(start), Ok(index)) => index >= start && index <= start + &task.len,
            _ => false,
        }
    }

    pub fn summary(&self) -> JobSummary {
        let r = &self.request;
        JobSummary {
            id: self.id,
            salt: r.salt.clone(),
            digest: r.digest.clone(),
            key_len: r.key_len,
            iterations: r.iterations,
            alphabet: r.alphabet,
            algorithm: r.algorithm,
            max_concurrent_tasks: self.max_concurrent_tasks,
            running_tasks: self.running_tasks,
            tasks: self.tasks.values().map(Task::summary).collect(),
            created_at: self.created_at,
            finished_at: self.finished_at,
            password: self.password.clone(),
            cancelled: self.cancelled,
        }
    }
}
