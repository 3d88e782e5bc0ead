//! crackgrid-worker — the cracking side of crackgrid.
//!
//! A worker receives task assignments from the controller, enumerates each
//! task's slice of the candidate space on its own thread and reports
//! progress and results in periodic heartbeats.
//!
//! ```text
//!  controller ──push/kill──▶ server ──▶ Worker (event loop)
//!       ▲                                  │ one thread per task
//!       └────────── heartbeat ─────────────┤
//!                                          ▼
//!                               CrackEngine ◀─ progress/kill
//!                                   │
//!                            CandidateEnumerator
//! ```

pub mod engine;
pub mod enumerator;
pub mod error;
pub mod heartbeat;
pub mod server;
pub mod worker;

pub use engine::{CrackEngine, EngineRequest, Outcome};
pub use enumerator::{CandidateEnumerator, EnumeratorState};
pub use error::{AssignError, EngineError};
pub use heartbeat::{BoxFuture, ControllerClient};
pub use server::build_router;
pub use worker::{Worker, WorkerHandle};
