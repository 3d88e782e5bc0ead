//! crackgrid-api — REST API for the crackgrid controller.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/jobs` | Submit a cracking job |
//! | GET | `/api/v1/jobs/{id}` | One job, running or completed |
//! | DELETE | `/api/v1/jobs/{id}` | Cancel a job |
//! | POST | `/api/v1/heartbeat` | Worker heartbeat |
//! | GET | `/api/v1/status` | Scheduler status report |
//! | GET | `/healthz` | Liveness |
//!
//! Also provides the HTTP clients the controller uses to reach workers and
//! the workers use to reach the controller.

pub mod client;
pub mod handlers;

use axum::Router;
use axum::routing::{get, post};

use crackgrid_scheduler::ControllerHandle;

pub use client::{HttpControllerClient, HttpWorkerClient};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub controller: ControllerHandle,
}

/// Build the controller's router.
pub fn build_router(controller: ControllerHandle) -> Router {
    let state = ApiState { controller };

    let api_routes = Router::new()
        .route("/jobs", post(handlers::submit_job))
        .route("/jobs/{id}", get(handlers::get_job).delete(handlers::cancel_job))
        .route("/heartbeat", post(handlers::heartbeat))
        .route("/status", get(handlers::status))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
