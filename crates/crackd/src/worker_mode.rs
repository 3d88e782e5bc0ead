//! Worker mode — runs tasks pushed by a controller.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crack_core::WorkerConfig;
use crackgrid_api::HttpControllerClient;
use crackgrid_worker::Worker;

/// Bind the configured port and run until Ctrl-C.
pub async fn run_worker(config: WorkerConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "API server starting");
    serve_worker(config, listener, crate::shutdown_on_ctrl_c()).await
}

/// Run the worker on an already bound listener.
pub async fn serve_worker(
    config: WorkerConfig,
    listener: TcpListener,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let client = Arc::new(HttpControllerClient::new(config.controller.clone()));
    let (worker, handle) = Worker::new(config, client);
    let worker = tokio::spawn(worker.run(shutdown.clone()));

    let router = crackgrid_worker::build_router(handle);
    axum::serve(listener, router)
        .with_graceful_shutdown(crate::wait_for_shutdown(shutdown))
        .await?;

    worker.await?;
    info!("crackgrid worker stopped");
    Ok(())
}

/// Load the worker configuration, falling back to defaults.
pub fn load_config(path: Option<PathBuf>) -> anyhow::Result<WorkerConfig> {
    match path {
        Some(path) => WorkerConfig::from_file(&path),
        None => Ok(WorkerConfig::default()),
    }
}
