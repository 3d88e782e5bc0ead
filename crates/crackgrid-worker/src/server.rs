//! Worker HTTP surface.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/tasks` | Start a task assignment |
//! | POST | `/api/v1/jobs/{id}/kill` | Kill a job's running tasks |
//! | GET | `/api/v1/tasks` | Local task registry |
//! | GET | `/healthz` | Liveness |

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::warn;

use crack_core::{ApiResponse, JobId, TaskAssignment};

use crate::error::AssignError;
use crate::worker::WorkerHandle;

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (status, Json(ApiResponse::<()>::err(msg)))
}

/// Build the worker's router.
pub fn build_router(worker: WorkerHandle) -> Router {
    let api_routes = Router::new()
        .route("/tasks", get(list_tasks).post(assign_task))
        .route("/jobs/{id}/kill", post(kill_job))
        .with_state(worker);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(|| async { Json(ApiResponse::ok("ok")) }))
}

/// POST /api/v1/tasks
async fn assign_task(
    State(worker): State<WorkerHandle>,
    Json(assignment): Json<TaskAssignment>,
) -> impl IntoResponse {
    match worker.assign(assignment).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(ApiResponse::ok("started"))).into_response(),
        Err(e @ AssignError::Duplicate { .. }) => {
            error_response(&e.to_string(), StatusCode::CONFLICT).into_response()
        }
        Err(e @ AssignError::Invalid(_)) => {
            warn!(error = %e, "rejected task assignment");
            error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response()
        }
        Err(e @ (AssignError::Thread(_) | AssignError::Stopped)) => {
            error_response(&e.to_string(), StatusCode::SERVICE_UNAVAILABLE).into_response()
        }
    }
}

/// POST /api/v1/jobs/{id}/kill
async fn kill_job(State(worker): State<WorkerHandle>, Path(id): Path<JobId>) -> impl IntoResponse {
    match worker.kill_job(id).await {
        Ok(killed) => Json(ApiResponse::ok(killed)).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::SERVICE_UNAVAILABLE).into_response(),
    }
}

/// GET /api/v1/tasks
async fn list_tasks(State(worker): State<WorkerHandle>) -> impl IntoResponse {
    match worker.snapshot().await {
        Ok(tasks) => Json(ApiResponse::ok(tasks)).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::SERVICE_UNAVAILABLE).into_response(),
    }
}
