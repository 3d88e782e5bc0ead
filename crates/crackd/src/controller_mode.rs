//! Controller mode — schedules jobs over the worker fleet.
//!
//! In this mode, the daemon:
//! 1. Picks a provisioner for the fleet controller
//! 2. Starts the scheduler loop
//! 3. Serves the REST API
//! 4. On shutdown, stops the loop, which terminates provisioned workers

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crack_core::{ControllerConfig, ProvisionerKind};
use crackgrid_api::HttpWorkerClient;
use crackgrid_autoscale::{LocalProvisioner, NoopProvisioner, Provisioner};
use crackgrid_scheduler::Controller;

/// Bind the configured port and run until Ctrl-C.
pub async fn run_controller(config: ControllerConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "API server starting");
    serve_controller(config, listener, crate::shutdown_on_ctrl_c()).await
}

/// Run the controller on an already bound listener.
///
/// Returns an error if the scheduler loop stops on an internal
/// inconsistency.
pub async fn serve_controller(
    config: ControllerConfig,
    listener: TcpListener,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!(
        address = %config.address(),
        task_budget = config.task_budget,
        max_concurrent_tasks = config.max_concurrent_tasks,
        provisioner = ?config.fleet.provisioner,
        "crackgrid controller starting"
    );

    let provisioner = build_provisioner(&config)?;
    let (controller, handle) = Controller::new(config, Arc::new(HttpWorkerClient), provisioner);
    let scheduler = tokio::spawn(controller.run(shutdown.clone()));

    let router = crackgrid_api::build_router(handle);
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(crate::wait_for_shutdown(shutdown))
            .await
    });

    match scheduler.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "scheduler stopped");
            server.abort();
            return Err(e.into());
        }
        Err(e) => {
            server.abort();
            return Err(e.into());
        }
    }
    server.await??;

    info!("crackgrid controller stopped");
    Ok(())
}

fn build_provisioner(config: &ControllerConfig) -> anyhow::Result<Arc<dyn Provisioner>> {
    let fleet = &config.fleet;
    match fleet.provisioner {
        ProvisionerKind::None => Ok(Arc::new(NoopProvisioner)),
        ProvisionerKind::Local => {
            let binary = match &fleet.worker_binary {
                Some(path) => path.clone(),
                None => std::env::current_exe()?,
            };
            info!(binary = %binary.display(), base_port = fleet.base_port, "local provisioner");
            Ok(Arc::new(LocalProvisioner::new(
                binary,
                config.address(),
                fleet.slots_per_instance,
                fleet.base_port,
            )
            .with_heartbeat_interval(config.heartbeat_interval)))
        }
    }
}

/// Load the controller configuration, falling back to defaults.
pub fn load_config(path: Option<PathBuf>) -> anyhow::Result<ControllerConfig> {
    match path {
        Some(path) => {
            let config = ControllerConfig::from_file(&path)?;
            info!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        None => Ok(ControllerConfig::default()),
    }
}
