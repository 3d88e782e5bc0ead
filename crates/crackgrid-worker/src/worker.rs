//! Worker node — the task registry and its event loop.
//!
//! A single tokio task owns every task entry. It starts one engine thread
//! per assignment, relays kills, collects progress for heartbeats and
//! keeps terminal results until a heartbeat carrying them is accepted.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crack_core::{
    Candidate, Heartbeat, JobId, TaskAssignment, TaskId, TaskStatus, TaskStatusReport, WorkerConfig,
};

use crate::engine::{CrackEngine, EngineRequest, Outcome, REQUEST_BUFFER};
use crate::error::AssignError;
use crate::heartbeat::ControllerClient;

const COMMAND_BUFFER: usize = 64;

type TaskKey = (JobId, TaskId);

enum Command {
    Assign {
        assignment: TaskAssignment,
        reply: oneshot::Sender<Result<(), AssignError>>,
    },
    KillJob {
        job_id: JobId,
        reply: oneshot::Sender<usize>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<TaskStatusReport>>,
    },
}

/// An engine thread finished.
struct Finished {
    key: TaskKey,
    run: u64,
    outcome: Outcome,
}

struct TaskEntry {
    /// Distinguishes a re-assigned task from its killed predecessor.
    run: u64,
    status: TaskStatus,
    password: Option<String>,
    /// Dropping the sender also stops the engine.
    requests: Option<mpsc::Sender<EngineRequest>>,
}

/// Cloneable entry point into a running [`Worker`].
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Command>,
}

impl WorkerHandle {
    /// Start cracking a task.
    pub async fn assign(&self, assignment: TaskAssignment) -> Result<(), AssignError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Assign { assignment, reply })
            .await
            .map_err(|_| AssignError::Stopped)?;
        rx.await.map_err(|_| AssignError::Stopped)?
    }

    /// Kill every running task of a job; returns how many were running.
    pub async fn kill_job(&self, job_id: JobId) -> anyhow::Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Command::KillJob { job_id, reply }).await?;
        Ok(rx.await?)
    }

    /// Local view of the task registry, without progress.
    pub async fn snapshot(&self) -> anyhow::Result<Vec<TaskStatusReport>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Command::Snapshot { reply }).await?;
        Ok(rx.await?)
    }
}

pub struct Worker {
    config: WorkerConfig,
    address: String,
    client: Arc<dyn ControllerClient>,
    tasks: BTreeMap<TaskKey, TaskEntry>,
    next_run: u64,
    commands: mpsc::Receiver<Command>,
    finished_tx: mpsc::UnboundedSender<Finished>,
    finished: mpsc::UnboundedReceiver<Finished>,
}

impl Worker {
    pub fn new(config: WorkerConfig, client: Arc<dyn ControllerClient>) -> (Self, WorkerHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (finished_tx, finished) = mpsc::unbounded_channel();
        let worker = Self {
            address: config.address(),
            config,
            client,
            tasks: BTreeMap::new(),
            next_run: 0,
            commands,
            finished_tx,
            finished,
        };
        (worker, WorkerHandle { tx })
    }

    /// Run until `shutdown` fires. Running engines are stopped on exit.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            address = %self.address,
            controller = %self.config.controller,
            slots = self.config.slots,
            "worker started"
        );

        let period = self.config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first heartbeat registers us with the controller.
        self.send_heartbeat().await;

        loop {
            tokio::select! {
                Some(command) = self.commands.recv() => self.handle_command(command),
                Some(finished) = self.finished.recv() => self.record_outcome(finished),
                _ = heartbeat.tick() => self.send_heartbeat().await,
                _ = shutdown.changed() => break,
            }
        }

        let running = self.tasks.len();
        self.tasks.clear();
        info!(running, "worker stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Assign { assignment, reply } => {
                let _ = reply.send(self.start_task(assignment));
            }
            Command::KillJob { job_id, reply } => {
                let _ = reply.send(self.kill_job(job_id));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(
                    self.tasks
                        .iter()
                        .map(|(key, entry)| report(*key, entry, None))
                        .collect(),
                );
            }
        }
    }

    fn start_task(&mut self, assignment: TaskAssignment) -> Result<(), AssignError> {
        let key = (assignment.job_id, assignment.task_id);
        if self
            .tasks
            .get(&key)
            .is_some_and(|e| e.status == TaskStatus::Running)
        {
            warn!(job_id = key.0, task_id = key.1, "duplicate assignment discarded");
            return Err(AssignError::Duplicate {
                job_id: key.0,
                task_id: key.1,
            });
        }

        let (requests, rx) = mpsc::channel(REQUEST_BUFFER);
        let engine = CrackEngine::new(&assignment, rx)?;

        let running = self
            .tasks
            .values()
            .filter(|e| e.status == TaskStatus::Running)
            .count();
        if running >= self.config.slots as usize {
            warn!(running, slots = self.config.slots, "assignment beyond declared slots");
        }

        self.next_run += 1;
        let run = self.next_run;
        let finished_tx = self.finished_tx.clone();
        std::thread::Builder::new()
            .name(format!("crack-{}-{}", key.0, key.1))
            .spawn(move || {
                let outcome = engine.run();
                let _ = finished_tx.send(Finished { key, run, outcome });
            })
            .inspect_err(|e| {
                error!(job_id = key.0, task_id = key.1, error = %e, "failed to start engine thread")
            })?;

        info!(
            job_id = key.0,
            task_id = key.1,
            start = %assignment.start,
            task_len = %assignment.task_len,
            resumed = assignment.checkpoint.is_some(),
            "task started"
        );
        self.tasks.insert(
            key,
            TaskEntry {
                run,
                status: TaskStatus::Running,
                password: None,
                requests: Some(requests),
            },
        );
        Ok(())
    }

    /// Stop and forget the running tasks of `job_id`.
    fn kill_job(&mut self, job_id: JobId) -> usize {
        let keys: Vec<TaskKey> = self
            .tasks
            .iter()
            .filter(|(k, e)| k.0 == job_id && e.status == TaskStatus::Running)
            .map(|(k, _)| *k)
            .collect();

        for key in &keys {
            if let Some(entry) = self.tasks.remove(key)
                && let Some(requests) = entry.requests
            {
                let _ = requests.try_send(EngineRequest::Kill);
            }
        }
        if keys.is_empty() {
            debug!(job_id, "kill for a job with no running tasks");
        } else {
            info!(job_id, killed = keys.len(), "job killed");
        }
        keys.len()
    }

    fn record_outcome(&mut self, finished: Finished) {
        let Finished { key, run, outcome } = finished;
        let Some(entry) = self.tasks.get_mut(&key).filter(|e| e.run == run) else {
            debug!(job_id = key.0, task_id = key.1, ?outcome, "outcome of a forgotten task");
            return;
        };

        entry.requests = None;
        match outcome {
            Outcome::Found(password) => {
                info!(job_id = key.0, task_id = key.1, %password, "password found");
                entry.status = TaskStatus::PasswordFound;
                entry.password = Some(password);
            }
            Outcome::NotFound => {
                info!(job_id = key.0, task_id = key.1, "task exhausted");
                entry.status = TaskStatus::PasswordNotFound;
            }
            Outcome::Killed => {
                self.tasks.remove(&key);
            }
        }
    }

    /// Ask every running engine for its checkpoint, waiting at most the
    /// progress timeout in total.
    async fn collect_progress(&self) -> BTreeMap<TaskKey, Candidate> {
        let mut pending = Vec::new();
        for (key, entry) in &self.tasks {
            if let Some(requests) = &entry.requests {
                let (reply, rx) = oneshot::channel();
                if requests.try_send(EngineRequest::Progress(reply)).is_ok() {
                    pending.push((*key, rx));
                }
            }
        }

        let deadline = Instant::now() + self.config.progress_timeout;
        let mut progress = BTreeMap::new();
        for (key, rx) in pending {
            match tokio::time::timeout_at(deadline, rx).await {
                Ok(Ok(Some(checkpoint))) => {
                    progress.insert(key, checkpoint);
                }
                Ok(_) => {}
                Err(_) => debug!(job_id = key.0, task_id = key.1, "progress not ready in time"),
            }
        }
        progress
    }

    async fn build_heartbeat(&self) -> (Heartbeat, Vec<(TaskKey, u64)>) {
        let progress = self.collect_progress().await;
        let mut terminal = Vec::new();
        let statuses = self
            .tasks
            .iter()
            .map(|(key, entry)| {
                if entry.status.is_terminal() {
                    terminal.push((*key, entry.run));
                }
                report(*key, entry, progress.get(key).cloned())
            })
            .collect();

        let beat = Heartbeat {
            address: self.address.clone(),
            slots: self.config.slots,
            statuses,
        };
        (beat, terminal)
    }

    async fn send_heartbeat(&mut self) {
        let (beat, terminal) = self.build_heartbeat().await;
        let statuses = beat.statuses.len();
        let timeout = self.config.heartbeat_timeout;

        match tokio::time::timeout(timeout, self.client.send_heartbeat(beat)).await {
            Ok(Ok(())) => {
                debug!(statuses, "heartbeat accepted");
                for (key, run) in terminal {
                    if self.tasks.get(&key).is_some_and(|e| e.run == run) {
                        self.tasks.remove(&key);
                    }
                }
            }
            Ok(Err(e)) => warn!(controller = %self.config.controller, error = %e, "heartbeat failed"),
            Err(_) => warn!(controller = %self.config.controller, ?timeout, "heartbeat timed out"),
        }
    }
}

fn report(key: TaskKey, entry: &TaskEntry, checkpoint: Option<Candidate>) -> TaskStatusReport {
    TaskStatusReport {
        job_id: key.0,
        task_id: key.1,
        status: entry.status,
        password: entry.password.clone(),
        checkpoint,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use num_bigint::BigUint;

    use crack_core::{Algorithm, Alphabet, Hasher, Pbkdf2Sha256};

    use super::*;
    use crate::heartbeat::BoxFuture;

    /// Records heartbeats; fails while `down` is set.
    #[derive(Clone, Default)]
    struct RecordingController {
        beats: Arc<Mutex<Vec<Heartbeat>>>,
        down: Arc<Mutex<bool>>,
    }

    impl RecordingController {
        fn beats(&self) -> Vec<Heartbeat> {
            self.beats.lock().unwrap().clone()
        }

        fn set_down(&self, down: bool) {
            *self.down.lock().unwrap() = down;
        }
    }

    impl ControllerClient for RecordingController {
        fn send_heartbeat(&self, beat: Heartbeat) -> BoxFuture<anyhow::Result<()>> {
            let down = *self.down.lock().unwrap();
            self.beats.lock().unwrap().push(beat);
            Box::pin(async move {
                if down {
                    anyhow::bail!("controller unreachable");
                }
                Ok(())
            })
        }
    }

    fn config() -> WorkerConfig {
        WorkerConfig {
            port: 9100,
            heartbeat_interval: Duration::from_millis(200),
            ..WorkerConfig::default()
        }
    }

    fn assignment(job_id: JobId, password: &str, task_len: u32) -> TaskAssignment {
        let salt = b"salt".to_vec();
        TaskAssignment {
            job_id,
            task_id: 0,
            digest: Pbkdf2Sha256.hash(password.as_bytes(), &salt, 1, 32),
            salt,
            key_len: 4,
            iterations: 1,
            alphabet: Alphabet::AlphaLower,
            algorithm: Algorithm::Pbkdf2Sha256,
            start: "aaaa".into(),
            task_len: BigUint::from(task_len),
            checkpoint: None,
        }
    }

    fn start(config: WorkerConfig) -> (WorkerHandle, RecordingController, watch::Sender<bool>) {
        let controller = RecordingController::default();
        let (worker, handle) = Worker::new(config, Arc::new(controller.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(worker.run(shutdown_rx));
        (handle, controller, shutdown_tx)
    }

    async fn wait_for<F: Fn(&[Heartbeat]) -> bool>(controller: &RecordingController, f: F) {
        for _ in 0..200 {
            if f(&controller.beats()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("condition not reached, beats: {:?}", controller.beats());
    }

    fn reports_status(beats: &[Heartbeat], status: TaskStatus) -> bool {
        beats
            .iter()
            .any(|b| b.statuses.iter().any(|s| s.status == status))
    }

    #[tokio::test]
    async fn first_heartbeat_registers_the_worker() {
        let (_handle, controller, _shutdown) = start(config());
        wait_for(&controller, |b| !b.is_empty()).await;
        let first = &controller.beats()[0];
        assert_eq!(first.address, "127.0.0.1:9100");
        assert_eq!(first.slots, 2);
        assert!(first.statuses.is_empty());
    }

    #[tokio::test]
    async fn found_password_is_reported_once() {
        let (handle, controller, _shutdown) = start(config());
        handle.assign(assignment(1, "abcd", 26 * 26 * 26 * 26)).await.unwrap();

        wait_for(&controller, |b| reports_status(b, TaskStatus::PasswordFound)).await;
        let found = controller
            .beats()
            .iter()
            .flat_map(|b| b.statuses.clone())
            .find(|s| s.status == TaskStatus::PasswordFound)
            .unwrap();
        assert_eq!(found.password.as_deref(), Some("abcd"));

        // Accepted, so the next heartbeats no longer carry it.
        let seen = controller.beats().len();
        wait_for(&controller, |b| b.len() >= seen + 2).await;
        assert!(controller.beats()[seen..].iter().all(|b| b.statuses.is_empty()));
        assert!(handle.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn terminal_status_survives_a_failed_heartbeat() {
        let (handle, controller, _shutdown) = start(config());
        wait_for(&controller, |b| !b.is_empty()).await;
        controller.set_down(true);

        handle.assign(assignment(1, "zzzz", 1)).await.unwrap();
        wait_for(&controller, |b| reports_status(b, TaskStatus::PasswordNotFound)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status, TaskStatus::PasswordNotFound);

        controller.set_down(false);
        let seen = controller.beats().len();
        wait_for(&controller, |b| b.len() >= seen + 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn running_tasks_report_progress() {
        let (handle, controller, _shutdown) = start(config());
        handle.assign(assignment(3, "zzzz", 26 * 26 * 26 * 26)).await.unwrap();

        wait_for(&controller, |b| {
            b.iter().any(|beat| {
                beat.statuses
                    .iter()
                    .any(|s| s.status == TaskStatus::Running && s.checkpoint.is_some())
            })
        })
        .await;
        assert_eq!(handle.kill_job(3).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn kill_drops_the_task_without_a_result() {
        let (handle, controller, _shutdown) = start(config());
        handle.assign(assignment(5, "zzzz", 26 * 26 * 26 * 26)).await.unwrap();
        assert_eq!(handle.snapshot().await.unwrap().len(), 1);

        assert_eq!(handle.kill_job(5).await.unwrap(), 1);
        assert!(handle.snapshot().await.unwrap().is_empty());
        assert_eq!(handle.kill_job(5).await.unwrap(), 0);
        assert_eq!(handle.kill_job(77).await.unwrap(), 0);

        let seen = controller.beats().len();
        wait_for(&controller, |b| b.len() >= seen + 2).await;
        assert!(controller.beats()[seen..].iter().all(|b| b.statuses.is_empty()));
    }

    #[tokio::test]
    async fn duplicate_and_invalid_assignments_are_refused() {
        let (handle, _, _shutdown) = start(config());
        let a = assignment(1, "zzzz", 26 * 26 * 26 * 26);
        handle.assign(a.clone()).await.unwrap();
        assert!(matches!(
            handle.assign(a).await,
            Err(AssignError::Duplicate { job_id: 1, task_id: 0 })
        ));

        let mut bad = assignment(2, "zzzz", 10);
        bad.start = "aa1a".into();
        assert!(matches!(handle.assign(bad).await, Err(AssignError::Invalid(_))));
        handle.kill_job(1).await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_stops_the_worker() {
        let (handle, _, shutdown) = start(config());
        shutdown.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(
            handle.assign(assignment(1, "abcd", 1)).await,
            Err(AssignError::Stopped)
        ));
    }
}
