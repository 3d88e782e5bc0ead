//! Scheduler state and its transitions.
//!
//! Everything here is synchronous and owned by the controller loop. Each
//! transition returns the side effects (kills to send, watchdogs to start)
//! for the loop to carry out, so the bookkeeping can be tested without a
//! runtime.
//!
//! ```text
//!   submit ──► queue ──assign──► scheduled + worker.tasks
//!                ▲                      │
//!                └──── reclaim ◄────────┤ (watchdog miss)
//!                                       ├──► NotFound: removed
//!                                       └──► Found: job finished
//! ```

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, error, info, warn};

use crack_core::{
    Heartbeat, JobId, JobRequest, StatusReport, TaskAssignment, TaskStatus, TaskStatusReport,
    TaskSummary, ValidationError, WorkerSummary,
};

use crate::error::{SchedulerError, SchedulerResult};
use crate::jobs::{Job, TaskKey};
use crate::registry::WorkerRegistry;

/// A kill request for `job_id` owed to the worker at `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kill {
    pub address: String,
    pub job_id: JobId,
}

/// Side effects of one heartbeat.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HeartbeatOutcome {
    /// Set when the heartbeat registered a new worker.
    pub registered: Option<u64>,
    pub kills: Vec<Kill>,
}

pub struct SchedulerState {
    task_budget: u64,
    default_max_concurrent: u32,
    next_job_id: JobId,
    jobs: BTreeMap<JobId, Job>,
    completed: BTreeMap<JobId, Job>,
    /// Tasks waiting for a worker, front first.
    queue: VecDeque<TaskKey>,
    /// Tasks assigned to some worker.
    scheduled: Vec<TaskKey>,
    workers: WorkerRegistry,
}

impl SchedulerState {
    pub fn new(task_budget: u64, default_max_concurrent: u32) -> Self {
        Self {
            task_budget,
            default_max_concurrent,
            next_job_id: 1,
            jobs: BTreeMap::new(),
            completed: BTreeMap::new(),
            queue: VecDeque::new(),
            scheduled: Vec::new(),
            workers: WorkerRegistry::new(),
        }
    }

    // ── Jobs ───────────────────────────────────────────────────────

    /// Partition a job and append its tasks to the queue.
    pub fn submit(&mut self, request: JobRequest, now: u64) -> Result<JobId, ValidationError> {
        let id = self.next_job_id;
        let job = Job::new(
            id,
            request,
            self.default_max_concurrent,
            self.task_budget,
            now,
        )?;
        self.next_job_id += 1;

        self.queue.extend(job.tasks().map(|t| t.key));
        info!(
            job_id = id,
            tasks = job.task_count(),
            alphabet = ?job.request.alphabet,
            key_len = job.request.key_len,
            max_concurrent_tasks = job.max_concurrent_tasks,
            "job registered"
        );
        self.jobs.insert(id, job);
        Ok(id)
    }

    /// Cancel an active job. Returns `None` if the job is not active.
    pub fn cancel(&mut self, job_id: JobId, now: u64) -> SchedulerResult<Option<Vec<Kill>>> {
        if !self.jobs.contains_key(&job_id) {
            return Ok(None);
        }
        info!(job_id, "job cancelled");
        self.finish_job(job_id, None, true, None, now).map(Some)
    }

    // ── Assignment ─────────────────────────────────────────────────

    /// Pick the earliest queued task whose job is below its cap and hand it
    /// to the least-loaded worker with a spare slot.
    ///
    /// The state is updated before the caller pushes the task; a failed
    /// push is left for the worker's watchdog.
    pub fn next_assignment(&mut self) -> SchedulerResult<Option<(String, TaskAssignment)>> {
        let Some(address) = self
            .workers
            .least_loaded_available()
            .map(|w| w.address.clone())
        else {
            return Ok(None);
        };
        let Some(position) = self
            .queue
            .iter()
            .position(|k| self.jobs.get(&k.job_id).is_some_and(Job::has_capacity))
        else {
            return Ok(None);
        };
        let Some(key) = self.queue.remove(position) else {
            return Ok(None);
        };

        let job = self
            .jobs
            .get_mut(&key.job_id)
            .ok_or(SchedulerError::JobNotFound(key.job_id))?;
        let assignment = job
            .assignment(key.task_id)
            .ok_or(SchedulerError::TaskNotFound(key))?;
        job.increase_running()?;

        self.scheduled.push(key);
        if let Some(worker) = self.workers.get_mut(&address) {
            worker.tasks.push(key);
        }
        debug!(task = %key, %address, "task scheduled");
        Ok(Some((address, assignment)))
    }

    // ── Heartbeats ─────────────────────────────────────────────────

    pub fn apply_heartbeat(&mut self, beat: &Heartbeat, now: u64) -> SchedulerResult<HeartbeatOutcome> {
        let mut outcome = HeartbeatOutcome::default();

        match self.workers.get_mut(&beat.address) {
            Some(worker) => worker.slots = beat.slots,
            None => {
                let generation = self.workers.register(&beat.address, beat.slots);
                info!(address = %beat.address, slots = beat.slots, generation, "worker registered");
                outcome.registered = Some(generation);
            }
        }

        for status in &beat.statuses {
            self.apply_status(&beat.address, status, now, &mut outcome)?;
        }
        Ok(outcome)
    }

    fn apply_status(
        &mut self,
        address: &str,
        status: &TaskStatusReport,
        now: u64,
        outcome: &mut HeartbeatOutcome,
    ) -> SchedulerResult<()> {
        let key = TaskKey {
            job_id: status.job_id,
            task_id: status.task_id,
        };

        let Some(job) = self.jobs.get_mut(&key.job_id) else {
            if status.status == TaskStatus::Running {
                debug!(%address, job_id = key.job_id, "worker runs an unknown job, killing it");
                let kill = Kill {
                    address: address.to_string(),
                    job_id: key.job_id,
                };
                if !outcome.kills.contains(&kill) {
                    outcome.kills.push(kill);
                }
            } else {
                debug!(%address, task = %key, status = ?status.status, "status for an unknown job ignored");
            }
            return Ok(());
        };

        let held = self.workers.get(address).is_some_and(|w| w.holds(&key));

        match status.status {
            TaskStatus::Running => {
                if !held {
                    debug!(%address, task = %key, "progress for a task the worker does not hold");
                    return Ok(());
                }
                let Some(checkpoint) = &status.checkpoint else {
                    return Ok(());
                };
                if !job.accepts_checkpoint(key.task_id, checkpoint) {
                    warn!(%address, task = %key, %checkpoint, "checkpoint outside the task");
                    return Ok(());
                }
                if let Some(task) = job.task_mut(key.task_id) {
                    task.checkpoint = Some(checkpoint.clone());
                }
            }
            TaskStatus::PasswordFound => {
                let Some(password) = status.password.clone() else {
                    warn!(%address, task = %key, "password found without a password");
                    return Ok(());
                };
                info!(job_id = key.job_id, task_id = key.task_id, %address, %password, "password found");
                let kills = self.finish_job(key.job_id, Some(password), false, Some(key), now)?;
                outcome.kills.extend(kills);
            }
            TaskStatus::PasswordNotFound => {
                if !held {
                    debug!(%address, task = %key, "result for a task the worker does not hold");
                    return Ok(());
                }
                self.complete_task(address, key, now)?;
            }
        }
        Ok(())
    }

    /// Remove a finished task from its job, the scheduled list and its
    /// worker. All three must hold it; otherwise nothing is changed.
    fn complete_task(&mut self, address: &str, key: TaskKey, now: u64) -> SchedulerResult<()> {
        let in_job = self
            .jobs
            .get(&key.job_id)
            .is_some_and(|j| j.task(key.task_id).is_some());
        let scheduled_at = self.scheduled.iter().position(|k| *k == key);
        let assigned_at = self
            .workers
            .get(address)
            .and_then(|w| w.tasks.iter().position(|k| *k == key));

        let (true, Some(scheduled_at), Some(assigned_at)) = (in_job, scheduled_at, assigned_at) else {
            error!(
                %address,
                task = %key,
                in_job,
                scheduled = scheduled_at.is_some(),
                assigned = assigned_at.is_some(),
                "task bookkeeping out of sync, leaving it in place"
            );
            return Ok(());
        };

        self.scheduled.remove(scheduled_at);
        if let Some(worker) = self.workers.get_mut(address) {
            worker.tasks.remove(assigned_at);
        }
        let job = self
            .jobs
            .get_mut(&key.job_id)
            .ok_or(SchedulerError::JobNotFound(key.job_id))?;
        job.remove_task(key.task_id);
        job.decrease_running()?;
        debug!(task = %key, remaining = job.task_count(), "task exhausted without a match");

        if job.task_count() == 0 {
            self.finish_job(key.job_id, None, false, None, now)?;
        }
        Ok(())
    }

    /// Clear every trace of a job's tasks and move it to the completed set.
    ///
    /// Returns a kill for each worker still holding one of its tasks,
    /// other than `finished`.
    fn finish_job(
        &mut self,
        job_id: JobId,
        password: Option<String>,
        cancelled: bool,
        finished: Option<TaskKey>,
        now: u64,
    ) -> SchedulerResult<Vec<Kill>> {
        let Some(mut job) = self.jobs.remove(&job_id) else {
            return Err(SchedulerError::JobNotFound(job_id));
        };

        let kills = self
            .workers
            .holders_of(job_id, finished)
            .into_iter()
            .map(|address| Kill { address, job_id })
            .collect();

        self.queue.retain(|k| k.job_id != job_id);
        let before = self.scheduled.len();
        self.scheduled.retain(|k| k.job_id != job_id);
        for _ in 0..before - self.scheduled.len() {
            job.decrease_running()?;
        }
        self.workers.unassign_job(job_id);

        job.finish(password, cancelled, now);
        info!(
            job_id,
            found = job.password.is_some(),
            cancelled,
            elapsed_secs = now.saturating_sub(job.created_at),
            "job completed"
        );
        self.completed.insert(job_id, job);
        Ok(kills)
    }

    // ── Failure reclamation ────────────────────────────────────────

    /// Forget a silent worker and put its tasks back at the queue front.
    ///
    /// Returns `None` when `generation` is no longer the worker's current
    /// registration (it re-registered after the watchdog fired).
    pub fn reclaim(&mut self, address: &str, generation: u64) -> SchedulerResult<Option<Vec<TaskKey>>> {
        let Some(worker) = self.workers.remove_generation(address, generation) else {
            debug!(%address, generation, "stale miss ignored");
            return Ok(None);
        };

        for key in worker.tasks.iter().rev() {
            self.scheduled.retain(|k| k != key);
            self.queue.push_front(*key);
            match self.jobs.get_mut(&key.job_id) {
                Some(job) => job.decrease_running()?,
                None => error!(%address, task = %key, "reclaimed task of an unknown job"),
            }
        }

        warn!(%address, generation, reclaimed = worker.tasks.len(), "worker removed, tasks requeued");
        Ok(Some(worker.tasks))
    }

    // ── Reporting ──────────────────────────────────────────────────

    /// Slots needed to run everything outstanding, capped at `fleet_cap`.
    pub fn required_slots(&self, fleet_cap: u64) -> u64 {
        ((self.scheduled.len() + self.queue.len()) as u64).min(fleet_cap)
    }

    pub fn available_slots(&self) -> u64 {
        self.workers.total_slots()
    }

    pub fn workers_by_load(&self) -> Vec<String> {
        self.workers.by_load()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue(&self) -> impl Iterator<Item = &TaskKey> {
        self.queue.iter()
    }

    pub fn scheduled(&self) -> &[TaskKey] {
        &self.scheduled
    }

    pub fn workers(&self) -> &WorkerRegistry {
        &self.workers
    }

    pub fn job(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.get(&job_id)
    }

    pub fn completed_job(&self, job_id: JobId) -> Option<&Job> {
        self.completed.get(&job_id)
    }

    pub fn status(&self, fleet_cap: u64) -> StatusReport {
        let workers = self
            .workers
            .iter()
            .map(|w| WorkerSummary {
                address: w.address.clone(),
                slots: w.slots,
                tasks: w
                    .tasks
                    .iter()
                    .filter_map(|k| self.task_summary(k))
                    .collect(),
            })
            .collect();

        StatusReport {
            required_slots: self.required_slots(fleet_cap),
            available_slots: self.available_slots(),
            queued_tasks: self.queue.len(),
            scheduled_tasks: self.scheduled.len(),
            workers,
            jobs: self.jobs.values().map(Job::summary).collect(),
            completed_jobs: self.completed.values().map(Job::summary).collect(),
        }
    }

    fn task_summary(&self, key: &TaskKey) -> Option<TaskSummary> {
        self.jobs
            .get(&key.job_id)?
            .task(key.task_id)
            .map(|t| t.summary())
    }
}

#[cfg(test)]
mod tests {
    use crack_core::{Algorithm, Alphabet, Candidate};

    use super::*;

    /// Numerical, length 2, tasks of 10: ten tasks `00`, `10`, … `90`.
    fn request(max_concurrent_tasks: Option<u32>) -> JobRequest {
        JobRequest {
            salt: b"salt".to_vec(),
            digest: vec![0x42; 32],
            key_len: 2,
            iterations: 1,
            alphabet: Alphabet::Numerical,
            algorithm: Algorithm::Pbkdf2Sha256,
            max_concurrent_tasks,
        }
    }

    fn state() -> SchedulerState {
        SchedulerState::new(10, 4)
    }

    fn beat(address: &str, slots: u32, statuses: Vec<TaskStatusReport>) -> Heartbeat {
        Heartbeat {
            address: address.to_string(),
            slots,
            statuses,
        }
    }

    fn report(job_id: JobId, task_id: u64, status: TaskStatus) -> TaskStatusReport {
        TaskStatusReport {
            job_id,
            task_id,
            status,
            password: None,
            checkpoint: None,
        }
    }

    fn key(job_id: JobId, task_id: u64) -> TaskKey {
        TaskKey { job_id, task_id }
    }

    fn assign_all(s: &mut SchedulerState) -> Vec<(String, TaskAssignment)> {
        let mut out = Vec::new();
        while let Some(a) = s.next_assignment().unwrap() {
            out.push(a);
        }
        out
    }

    #[test]
    fn submit_queues_every_task_in_order() {
        let mut s = state();
        let id = s.submit(request(None), 0).unwrap();
        assert_eq!(s.queue_len(), 10);
        assert_eq!(s.queue().next(), Some(&key(id, 0)));
        assert_eq!(s.job(id).unwrap().task_count(), 10);
    }

    #[test]
    fn invalid_submission_leaves_no_trace() {
        let mut s = state();
        let mut r = request(None);
        r.iterations = 0;
        assert!(s.submit(r, 0).is_err());
        assert_eq!(s.queue_len(), 0);
        assert_eq!(s.submit(request(None), 0).unwrap(), 1);
    }

    #[test]
    fn nothing_is_assigned_without_workers() {
        let mut s = state();
        s.submit(request(None), 0).unwrap();
        assert!(s.next_assignment().unwrap().is_none());
    }

    #[test]
    fn capped_job_never_exceeds_its_limit() {
        let mut s = state();
        let capped = s.submit(request(Some(2)), 0).unwrap();
        s.apply_heartbeat(&beat("a", 4, vec![]), 0).unwrap();
        s.apply_heartbeat(&beat("b", 4, vec![]), 0).unwrap();

        let assigned = assign_all(&mut s);
        assert_eq!(assigned.len(), 2);
        assert!(assigned.iter().all(|(_, a)| a.job_id == capped));
        assert_eq!(s.job(capped).unwrap().running_tasks(), 2);

        // A second, uncapped job fills the remaining slots around it.
        let other = s.submit(request(None), 0).unwrap();
        let assigned = assign_all(&mut s);
        assert_eq!(assigned.len(), 4);
        assert!(assigned.iter().all(|(_, a)| a.job_id == other));
        assert_eq!(s.job(capped).unwrap().running_tasks(), 2);
    }

    #[test]
    fn assignment_spreads_over_least_loaded_workers() {
        let mut s = state();
        s.submit(request(None), 0).unwrap();
        s.apply_heartbeat(&beat("b", 2, vec![]), 0).unwrap();
        s.apply_heartbeat(&beat("a", 2, vec![]), 0).unwrap();

        let order: Vec<String> = assign_all(&mut s).into_iter().map(|(w, _)| w).collect();
        assert_eq!(order, vec!["a", "b", "a", "b"]);
        assert_eq!(s.scheduled().len(), 4);
        assert_eq!(s.queue_len(), 6);
    }

    #[test]
    fn silent_worker_tasks_return_to_the_queue_front() {
        let mut s = state();
        let id = s.submit(request(None), 0).unwrap();
        let generation = s
            .apply_heartbeat(&beat("w", 2, vec![]), 0)
            .unwrap()
            .registered
            .unwrap();
        assign_all(&mut s);
        assert_eq!(s.workers().get("w").unwrap().tasks, vec![key(id, 0), key(id, 1)]);

        let reclaimed = s.reclaim("w", generation).unwrap().unwrap();
        assert_eq!(reclaimed, vec![key(id, 0), key(id, 1)]);
        let front: Vec<TaskKey> = s.queue().take(3).copied().collect();
        assert_eq!(front, vec![key(id, 0), key(id, 1), key(id, 2)]);
        assert_eq!(s.queue_len(), 10);
        assert!(s.scheduled().is_empty());
        assert!(s.workers().is_empty());
        assert_eq!(s.job(id).unwrap().running_tasks(), 0);

        // A second miss for the same registration is a no-op.
        assert!(s.reclaim("w", generation).unwrap().is_none());
        assert_eq!(s.queue_len(), 10);
    }

    #[test]
    fn miss_from_an_older_registration_is_stale() {
        let mut s = state();
        s.submit(request(None), 0).unwrap();
        let first = s.apply_heartbeat(&beat("w", 2, vec![]), 0).unwrap().registered.unwrap();
        s.reclaim("w", first).unwrap();
        s.apply_heartbeat(&beat("w", 2, vec![]), 0).unwrap();
        assign_all(&mut s);

        assert!(s.reclaim("w", first).unwrap().is_none());
        assert_eq!(s.scheduled().len(), 2);
    }

    #[test]
    fn reclaimed_tasks_keep_their_checkpoint() {
        let mut s = state();
        let id = s.submit(request(None), 0).unwrap();
        let generation = s.apply_heartbeat(&beat("w", 1, vec![]), 0).unwrap().registered.unwrap();
        assign_all(&mut s);

        let mut progress = report(id, 0, TaskStatus::Running);
        progress.checkpoint = Some(Candidate::from("07"));
        s.apply_heartbeat(&beat("w", 1, vec![progress]), 0).unwrap();
        s.reclaim("w", generation).unwrap();

        s.apply_heartbeat(&beat("v", 1, vec![]), 0).unwrap();
        let (_, assignment) = s.next_assignment().unwrap().unwrap();
        assert_eq!(assignment.task_id, 0);
        assert_eq!(assignment.checkpoint, Some(Candidate::from("07")));
    }

    #[test]
    fn bad_checkpoints_are_ignored() {
        let mut s = state();
        let id = s.submit(request(None), 0).unwrap();
        s.apply_heartbeat(&beat("w", 1, vec![]), 0).unwrap();
        assign_all(&mut s);

        let mut progress = report(id, 0, TaskStatus::Running);
        progress.checkpoint = Some(Candidate::from("0a"));
        s.apply_heartbeat(&beat("w", 1, vec![progress.clone()]), 0).unwrap();
        assert_eq!(s.job(id).unwrap().task(0).unwrap().checkpoint, None);

        // Valid characters, but outside task 0's range 00..10.
        progress.checkpoint = Some(Candidate::from("95"));
        s.apply_heartbeat(&beat("w", 1, vec![progress.clone()]), 0).unwrap();
        assert_eq!(s.job(id).unwrap().task(0).unwrap().checkpoint, None);

        // The exhausted position is still a valid resume point.
        progress.checkpoint = Some(Candidate::from("10"));
        s.apply_heartbeat(&beat("w", 1, vec![progress]), 0).unwrap();
        assert_eq!(
            s.job(id).unwrap().task(0).unwrap().checkpoint,
            Some(Candidate::from("10"))
        );
    }

    #[test]
    fn redelivery_never_carries_a_foreign_checkpoint() {
        let mut s = state();
        let id = s.submit(request(None), 0).unwrap();
        let generation = s.apply_heartbeat(&beat("w", 1, vec![]), 0).unwrap().registered.unwrap();
        assign_all(&mut s);

        let mut progress = report(id, 0, TaskStatus::Running);
        progress.checkpoint = Some(Candidate::from("95"));
        s.apply_heartbeat(&beat("w", 1, vec![progress]), 0).unwrap();
        s.reclaim("w", generation).unwrap();

        s.apply_heartbeat(&beat("v", 1, vec![]), 0).unwrap();
        let (_, assignment) = s.next_assignment().unwrap().unwrap();
        assert_eq!(assignment.task_id, 0);
        assert_eq!(assignment.checkpoint, None);
    }

    #[test]
    fn not_found_removes_the_task_everywhere() {
        let mut s = state();
        let id = s.submit(request(None), 0).unwrap();
        s.apply_heartbeat(&beat("w", 1, vec![]), 0).unwrap();
        assign_all(&mut s);

        s.apply_heartbeat(&beat("w", 1, vec![report(id, 0, TaskStatus::PasswordNotFound)]), 0)
            .unwrap();
        let job = s.job(id).unwrap();
        assert!(job.task(0).is_none());
        assert_eq!(job.running_tasks(), 0);
        assert!(s.scheduled().is_empty());
        assert!(s.workers().get("w").unwrap().tasks.is_empty());
    }

    #[test]
    fn last_not_found_completes_the_job() {
        let mut s = state();
        let mut r = request(None);
        r.key_len = 1;
        let id = s.submit(r, 0).unwrap();
        s.apply_heartbeat(&beat("w", 1, vec![]), 0).unwrap();
        assign_all(&mut s);

        s.apply_heartbeat(&beat("w", 1, vec![report(id, 0, TaskStatus::PasswordNotFound)]), 42)
            .unwrap();
        assert!(s.job(id).is_none());
        let done = s.completed_job(id).unwrap();
        assert_eq!(done.password, None);
        assert_eq!(done.finished_at, Some(42));
        assert!(!done.cancelled);
    }

    #[test]
    fn out_of_sync_result_is_left_in_place() {
        let mut s = state();
        let id = s.submit(request(None), 0).unwrap();
        s.apply_heartbeat(&beat("w", 1, vec![]), 0).unwrap();
        assign_all(&mut s);

        // Break the invariant: the task vanishes from the scheduled list.
        s.scheduled.clear();
        s.apply_heartbeat(&beat("w", 1, vec![report(id, 0, TaskStatus::PasswordNotFound)]), 0)
            .unwrap();
        assert!(s.job(id).unwrap().task(0).is_some());
        assert_eq!(s.workers().get("w").unwrap().tasks, vec![key(id, 0)]);
        assert_eq!(s.job(id).unwrap().running_tasks(), 1);
    }

    #[test]
    fn found_password_finishes_the_job_and_kills_the_rest() {
        let mut s = state();
        let id = s.submit(request(None), 0).unwrap();
        s.apply_heartbeat(&beat("a", 1, vec![]), 0).unwrap();
        s.apply_heartbeat(&beat("b", 1, vec![]), 0).unwrap();
        assign_all(&mut s);

        let mut found = report(id, 0, TaskStatus::PasswordFound);
        found.password = Some("42".into());
        let outcome = s.apply_heartbeat(&beat("a", 1, vec![found]), 7).unwrap();

        assert_eq!(
            outcome.kills,
            vec![Kill {
                address: "b".into(),
                job_id: id
            }]
        );
        assert!(s.job(id).is_none());
        assert_eq!(s.completed_job(id).unwrap().password.as_deref(), Some("42"));
        assert_eq!(s.queue_len(), 0);
        assert!(s.scheduled().is_empty());
        assert!(s.workers().iter().all(|w| w.tasks.is_empty()));
        assert_eq!(s.completed_job(id).unwrap().running_tasks(), 0);
    }

    #[test]
    fn running_status_for_unknown_job_earns_a_kill() {
        let mut s = state();
        let outcome = s
            .apply_heartbeat(
                &beat(
                    "w",
                    2,
                    vec![
                        report(99, 0, TaskStatus::Running),
                        report(99, 1, TaskStatus::Running),
                        report(98, 0, TaskStatus::PasswordNotFound),
                    ],
                ),
                0,
            )
            .unwrap();
        assert!(outcome.registered.is_some());
        assert_eq!(
            outcome.kills,
            vec![Kill {
                address: "w".into(),
                job_id: 99
            }]
        );
    }

    #[test]
    fn cancel_moves_the_job_to_completed() {
        let mut s = state();
        let id = s.submit(request(None), 0).unwrap();
        s.apply_heartbeat(&beat("w", 2, vec![]), 0).unwrap();
        assign_all(&mut s);

        let kills = s.cancel(id, 5).unwrap().unwrap();
        assert_eq!(kills.len(), 1);
        let done = s.completed_job(id).unwrap();
        assert!(done.cancelled);
        assert_eq!(done.password, None);
        assert_eq!(s.queue_len(), 0);
        assert!(s.cancel(id, 6).unwrap().is_none());
    }

    #[test]
    fn slot_accounting_and_status() {
        let mut s = state();
        let id = s.submit(request(None), 0).unwrap();
        s.apply_heartbeat(&beat("w", 3, vec![]), 0).unwrap();
        assign_all(&mut s);

        assert_eq!(s.required_slots(100), 10);
        assert_eq!(s.required_slots(4), 4);
        assert_eq!(s.available_slots(), 3);

        let status = s.status(100);
        assert_eq!(status.queued_tasks, 7);
        assert_eq!(status.scheduled_tasks, 3);
        assert_eq!(status.workers.len(), 1);
        assert_eq!(status.workers[0].tasks.len(), 3);
        assert_eq!(status.jobs[0].id, id);
        assert_eq!(status.jobs[0].running_tasks, 3);
        assert!(status.completed_jobs.is_empty());
    }
}
