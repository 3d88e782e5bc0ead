//! Outbound calls from the controller to workers.

use crack_core::{JobId, TaskAssignment};

pub use crackgrid_autoscale::BoxFuture;

/// Delivers task assignments and job kills to workers.
///
/// Calls are spawned off the scheduler loop and bounded by the
/// controller's push timeout.
pub trait WorkerClient: Send + Sync {
    fn push_task(&self, address: String, assignment: TaskAssignment) -> BoxFuture<anyhow::Result<()>>;

    fn kill_job(&self, address: String, job_id: JobId) -> BoxFuture<anyhow::Result<()>>;
}
