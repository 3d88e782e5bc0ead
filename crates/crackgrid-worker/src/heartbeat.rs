//! Heartbeat delivery seam.

use std::future::Future;
use std::pin::Pin;

use crack_core::Heartbeat;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Delivers heartbeats to the controller.
///
/// `Ok` means the controller accepted the heartbeat; the worker then
/// forgets the terminal statuses it carried.
pub trait ControllerClient: Send + Sync {
    fn send_heartbeat(&self, beat: Heartbeat) -> BoxFuture<anyhow::Result<()>>;
}
