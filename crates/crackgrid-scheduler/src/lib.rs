//! crackgrid-scheduler — the controller's scheduling loop.
//!
//! Owns every job, task and worker record. A single tokio task processes
//! job submissions, heartbeats, watchdog misses and timer ticks one at a
//! time, so no state is shared or locked.
//!
//! # Architecture
//!
//! ```text
//! Controller (one tokio task)
//!   ├── SchedulerState
//!   │   ├── jobs / completed jobs
//!   │   ├── task queue (front first) and scheduled list
//!   │   └── WorkerRegistry (least-loaded selection)
//!   ├── WatchdogSet (one task per worker, misses come back as events)
//!   ├── FleetController (PID tick, provisioner calls spawned)
//!   └── WorkerClient (task pushes and kills spawned)
//!
//! ControllerHandle ── mpsc ──► Controller ── oneshot ──► replies
//! ```

pub mod controller;
pub mod error;
pub mod jobs;
pub mod registry;
pub mod state;
pub mod transport;

pub use controller::{Controller, ControllerHandle};
pub use error::{SchedulerError, SchedulerResult};
pub use jobs::{Job, Task, TaskKey};
pub use registry::{Worker, WorkerRegistry};
pub use state::{HeartbeatOutcome, Kill, SchedulerState};
pub use transport::WorkerClient;
