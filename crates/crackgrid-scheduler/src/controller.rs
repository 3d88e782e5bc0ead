//! Controller — the single-threaded scheduling event loop.
//!
//! [`Controller::run`] multiplexes, with `tokio::select!`:
//!
//! - commands from any number of [`ControllerHandle`]s (job submission,
//!   cancellation, heartbeats, status queries)
//! - watchdog misses
//! - provisioner results from the fleet controller
//! - the assignment tick, whose period shrinks as the queue grows
//! - the fleet tick
//! - the shutdown signal
//!
//! Only the loop touches [`SchedulerState`]. Network calls are spawned.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crack_core::{ControllerConfig, Heartbeat, JobId, JobRequest, StatusReport, ValidationError, epoch_secs};
use crackgrid_autoscale::{FleetController, FleetDecision, FleetEvent, Provisioner};
use crackgrid_health::{WatchdogSet, WorkerMissed};

use crate::error::{SchedulerError, SchedulerResult};
use crate::state::{Kill, SchedulerState};
use crate::transport::WorkerClient;

/// Bound on queued commands before handles start waiting.
const COMMAND_BUFFER: usize = 256;

/// Shortest gap between two assignment ticks.
const MIN_SCHEDULE_DELAY: Duration = Duration::from_millis(1);

enum Command {
    SubmitJob {
        request: JobRequest,
        reply: oneshot::Sender<Result<JobId, ValidationError>>,
    },
    CancelJob {
        job_id: JobId,
        reply: oneshot::Sender<bool>,
    },
    Heartbeat {
        beat: Heartbeat,
        reply: oneshot::Sender<()>,
    },
    Status {
        reply: oneshot::Sender<StatusReport>,
    },
}

/// Cloneable entry point into a running [`Controller`].
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Command>,
}

impl ControllerHandle {
    /// Submit a job; returns its id once it is queued.
    pub async fn submit_job(&self, request: JobRequest) -> SchedulerResult<JobId> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SubmitJob { request, reply }).await?;
        Ok(rx.await.map_err(|_| SchedulerError::Stopped)??)
    }

    pub async fn cancel_job(&self, job_id: JobId) -> SchedulerResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::CancelJob { job_id, reply }).await?;
        match rx.await {
            Ok(true) => Ok(()),
            Ok(false) => Err(SchedulerError::JobNotFound(job_id)),
            Err(_) => Err(SchedulerError::Stopped),
        }
    }

    /// Deliver a heartbeat; returns once the loop has applied it.
    pub async fn heartbeat(&self, beat: Heartbeat) -> SchedulerResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Heartbeat { beat, reply }).await?;
        rx.await.map_err(|_| SchedulerError::Stopped)
    }

    pub async fn status(&self) -> SchedulerResult<StatusReport> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply }).await?;
        rx.await.map_err(|_| SchedulerError::Stopped)
    }

    async fn send(&self, command: Command) -> SchedulerResult<()> {
        self.tx.send(command).await.map_err(|_| SchedulerError::Stopped)
    }
}

/// The scheduler loop and everything it owns.
pub struct Controller {
    core: Core,
    commands: mpsc::Receiver<Command>,
    misses: mpsc::Receiver<WorkerMissed>,
    fleet_events: mpsc::Receiver<FleetEvent>,
}

/// State the loop mutates; kept apart from the receivers it polls.
struct Core {
    config: ControllerConfig,
    state: SchedulerState,
    watchdogs: WatchdogSet,
    fleet: FleetController,
    client: Arc<dyn WorkerClient>,
}

impl Controller {
    pub fn new(
        config: ControllerConfig,
        client: Arc<dyn WorkerClient>,
        provisioner: Arc<dyn Provisioner>,
    ) -> (Self, ControllerHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (miss_tx, misses) = mpsc::channel(COMMAND_BUFFER);
        let (fleet_tx, fleet_events) = mpsc::channel(COMMAND_BUFFER);

        let core = Core {
            state: SchedulerState::new(config.task_budget, config.max_concurrent_tasks),
            watchdogs: WatchdogSet::new(config.heartbeat_timeout, miss_tx),
            fleet: FleetController::new(&config.fleet, provisioner, fleet_tx),
            client,
            config,
        };

        let controller = Self {
            core,
            commands,
            misses,
            fleet_events,
        };
        (controller, ControllerHandle { tx })
    }

    /// Run until `shutdown` fires or the state becomes inconsistent.
    ///
    /// On the way out every watchdog is stopped and every provisioned
    /// instance terminated.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> SchedulerResult<()> {
        let Controller {
            mut core,
            mut commands,
            mut misses,
            mut fleet_events,
        } = self;

        info!(
            task_budget = core.config.task_budget,
            heartbeat_timeout = ?core.config.heartbeat_timeout,
            fleet_interval = ?core.config.fleet.interval,
            "controller loop started"
        );

        let fleet_period = core.config.fleet.interval;
        let mut fleet_tick = tokio::time::interval_at(Instant::now() + fleet_period, fleet_period);
        fleet_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut next_schedule = Instant::now() + core.schedule_delay();

        let result = loop {
            tokio::select! {
                _ = tokio::time::sleep_until(next_schedule) => {
                    if let Err(e) = core.schedule_once() {
                        break Err(e);
                    }
                    next_schedule = Instant::now() + core.schedule_delay();
                }
                _ = fleet_tick.tick() => core.run_fleet(),
                Some(command) = commands.recv() => {
                    if let Err(e) = core.handle_command(command) {
                        break Err(e);
                    }
                }
                Some(missed) = misses.recv() => {
                    if let Err(e) = core.handle_miss(missed) {
                        break Err(e);
                    }
                }
                Some(event) = fleet_events.recv() => core.fleet.record(event),
                _ = shutdown.changed() => break Ok(()),
            }
        };

        if let Err(e) = &result {
            error!(error = %e, "controller loop failed");
        }
        core.shutdown().await;
        result
    }
}

impl Core {
    /// Assignment tick period: the base interval divided by the queue
    /// length plus one.
    fn schedule_delay(&self) -> Duration {
        let divisor = u32::try_from(self.state.queue_len() + 1).unwrap_or(u32::MAX);
        (self.config.schedule_interval / divisor).max(MIN_SCHEDULE_DELAY)
    }

    fn schedule_once(&mut self) -> SchedulerResult<()> {
        let Some((address, assignment)) = self.state.next_assignment()? else {
            return Ok(());
        };
        info!(
            job_id = assignment.job_id,
            task_id = assignment.task_id,
            %address,
            resumed = assignment.checkpoint.is_some(),
            "task assigned"
        );

        let client = self.client.clone();
        let timeout = self.config.push_timeout;
        tokio::spawn(async move {
            let job_id = assignment.job_id;
            let task_id = assignment.task_id;
            match tokio::time::timeout(timeout, client.push_task(address.clone(), assignment)).await {
                Ok(Ok(())) => debug!(%address, job_id, task_id, "task delivered"),
                Ok(Err(e)) => {
                    warn!(%address, job_id, task_id, error = %e, "task push failed, leaving it to the watchdog")
                }
                Err(_) => warn!(%address, job_id, task_id, ?timeout, "task push timed out"),
            }
        });
        Ok(())
    }

    fn handle_command(&mut self, command: Command) -> SchedulerResult<()> {
        match command {
            Command::SubmitJob { request, reply } => {
                let result = self.state.submit(request, epoch_secs());
                if let Err(e) = &result {
                    debug!(error = %e, "job rejected");
                }
                let _ = reply.send(result);
            }
            Command::CancelJob { job_id, reply } => {
                let kills = self.state.cancel(job_id, epoch_secs())?;
                let known = kills.is_some();
                for kill in kills.into_iter().flatten() {
                    self.send_kill(kill);
                }
                let _ = reply.send(known);
            }
            Command::Heartbeat { beat, reply } => {
                let outcome = self.state.apply_heartbeat(&beat, epoch_secs())?;
                match outcome.registered {
                    Some(generation) => self.watchdogs.start(&beat.address, generation),
                    None => {
                        self.watchdogs.feed(&beat.address);
                    }
                }
                for kill in outcome.kills {
                    self.send_kill(kill);
                }
                let _ = reply.send(());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.state.status(self.config.fleet.fleet_cap()));
            }
        }
        Ok(())
    }

    fn handle_miss(&mut self, missed: WorkerMissed) -> SchedulerResult<()> {
        if self.state.reclaim(&missed.address, missed.generation)?.is_some() {
            self.watchdogs.stop(&missed.address);
        }
        Ok(())
    }

    fn run_fleet(&mut self) {
        let required = self.state.required_slots(self.config.fleet.fleet_cap());
        let available = self.state.available_slots();
        let by_load = self.state.workers_by_load();
        let decision = self.fleet.reconcile(required, available, &by_load);
        if decision != FleetDecision::Hold {
            info!(required, available, ?decision, "fleet adjusted");
        }
    }

    fn send_kill(&self, kill: Kill) {
        let client = self.client.clone();
        let timeout = self.config.push_timeout;
        tokio::spawn(async move {
            let Kill { address, job_id } = kill;
            match tokio::time::timeout(timeout, client.kill_job(address.clone(), job_id)).await {
                Ok(Ok(())) => debug!(%address, job_id, "kill delivered"),
                Ok(Err(e)) => warn!(%address, job_id, error = %e, "kill failed"),
                Err(_) => warn!(%address, job_id, ?timeout, "kill timed out"),
            }
        });
    }

    async fn shutdown(&mut self) {
        info!("controller shutting down");
        self.watchdogs.stop_all();
        self.fleet.terminate_all().await;
    }
}
