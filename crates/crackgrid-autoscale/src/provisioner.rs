//! Fleet provisioner seam.
//!
//! The fleet controller only ever talks to a [`Provisioner`]. Calls return
//! boxed `'static` futures so they can be spawned off the scheduler loop;
//! failures are logged by the caller and never stop the loop.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tracing::info;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Provisioner-assigned identity of one worker instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceHandle(pub String);

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creates and destroys worker instances.
pub trait Provisioner: Send + Sync {
    /// Start `count` new instances.
    fn create_instances(&self, count: u32) -> BoxFuture<anyhow::Result<Vec<InstanceHandle>>>;

    fn terminate_instances(&self, instances: Vec<InstanceHandle>) -> BoxFuture<anyhow::Result<()>>;

    /// The instance's worker address, once it has one.
    fn resolve_address(&self, instance: InstanceHandle) -> BoxFuture<anyhow::Result<Option<String>>>;
}

/// Logs scaling requests without acting on them.
///
/// Used when the fleet is managed by hand: workers still register through
/// their heartbeats.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProvisioner;

impl Provisioner for NoopProvisioner {
    fn create_instances(&self, count: u32) -> BoxFuture<anyhow::Result<Vec<InstanceHandle>>> {
        Box::pin(async move {
            info!(count, "provisioner disabled, not creating instances");
            Ok(Vec::new())
        })
    }

    fn terminate_instances(&self, instances: Vec<InstanceHandle>) -> BoxFuture<anyhow::Result<()>> {
        Box::pin(async move {
            info!(count = instances.len(), "provisioner disabled, not terminating instances");
            Ok(())
        })
    }

    fn resolve_address(&self, _instance: InstanceHandle) -> BoxFuture<anyhow::Result<Option<String>>> {
        Box::pin(async { Ok(None) })
    }
}
