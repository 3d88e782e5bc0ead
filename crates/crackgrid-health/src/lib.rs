//! crackgrid-health — worker liveness for the crackgrid controller.
//!
//! Every registered worker gets a watchdog task. Heartbeats feed the
//! watchdog; if none arrives within the timeout the watchdog reports a
//! [`WorkerMissed`] event to the controller and exits.
//!
//! # Architecture
//!
//! ```text
//! WatchdogSet
//!   ├── Per-worker background task
//!   │   ├── select! { beat, sleep(timeout) }
//!   │   └── WorkerMissed { address, generation } → controller
//!   └── stop / stop_all on removal and shutdown
//! ```
//!
//! Each registration carries a generation number. A miss from an older
//! generation of a worker that has since re-registered is stale and the
//! controller ignores it.

pub mod watchdog;

pub use watchdog::{Watchdog, WatchdogSet, WorkerMissed};
