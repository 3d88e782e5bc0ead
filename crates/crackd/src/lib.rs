//! crackd — the crackgrid daemon.
//!
//! One binary, two roles and two client tools:
//! - `crackd controller` runs the scheduler loop, fleet controller and
//!   the REST API clients submit jobs to
//! - `crackd worker` runs the task engines and heartbeats to a controller
//! - `crackd submit` sends jobs to a controller, fixed or randomly generated
//! - `crackd collect` samples the controller's status report into a JSON file

pub mod collect;
pub mod controller_mode;
pub mod submit;
pub mod worker_mode;

use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

/// Shutdown channel that fires on Ctrl-C.
pub fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
        }
        let _ = shutdown_tx.send(true);
    });
    shutdown_rx
}

/// Resolves once `shutdown` fires or its sender goes away.
pub(crate) async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Parse a non-zero duration argument like `"5s"` or `"500ms"`.
pub fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    match crack_core::config::parse_duration(s) {
        Some(d) if d.is_zero() => Err("duration must be greater than zero".to_string()),
        Some(d) => Ok(d),
        None => Err(format!("invalid duration {s:?}, expected e.g. 5s, 500ms or 2m")),
    }
}
