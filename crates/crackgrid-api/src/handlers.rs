//! REST API handlers.
//!
//! Each handler forwards to the scheduler loop through its
//! [`ControllerHandle`](crackgrid_scheduler::ControllerHandle) and wraps
//! the reply in an [`ApiResponse`] envelope.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::{error, warn};

use crack_core::{ApiResponse, Heartbeat, JobId, JobRequest};
use crackgrid_scheduler::SchedulerError;

use crate::ApiState;

/// Body returned for an accepted job.
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: JobId,
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (status, Json(ApiResponse::<()>::err(msg)))
}

fn scheduler_error(e: SchedulerError) -> axum::response::Response {
    let status = match &e {
        SchedulerError::Invalid(_) => StatusCode::BAD_REQUEST,
        SchedulerError::JobNotFound(_) => StatusCode::NOT_FOUND,
        SchedulerError::Stopped => StatusCode::SERVICE_UNAVAILABLE,
        SchedulerError::Accounting { .. } | SchedulerError::TaskNotFound(_) => {
            error!(error = %e, "scheduler failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(&e.to_string(), status).into_response()
}

/// POST /api/v1/jobs
pub async fn submit_job(
    State(state): State<ApiState>,
    Json(request): Json<JobRequest>,
) -> impl IntoResponse {
    match state.controller.submit_job(request).await {
        Ok(job_id) => (StatusCode::ACCEPTED, Json(ApiResponse::ok(JobAccepted { job_id }))).into_response(),
        Err(e) => {
            if matches!(e, SchedulerError::Invalid(_)) {
                warn!(error = %e, "job rejected");
            }
            scheduler_error(e)
        }
    }
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(State(state): State<ApiState>, Path(id): Path<JobId>) -> impl IntoResponse {
    match state.controller.status().await {
        Ok(report) => report
            .jobs
            .into_iter()
            .chain(report.completed_jobs)
            .find(|job| job.id == id)
            .map(|job| Json(ApiResponse::ok(job)).into_response())
            .unwrap_or_else(|| scheduler_error(SchedulerError::JobNotFound(id))),
        Err(e) => scheduler_error(e),
    }
}

/// DELETE /api/v1/jobs/{id}
pub async fn cancel_job(State(state): State<ApiState>, Path(id): Path<JobId>) -> impl IntoResponse {
    match state.controller.cancel_job(id).await {
        Ok(()) => Json(ApiResponse::ok("cancelled")).into_response(),
        Err(e) => scheduler_error(e),
    }
}

/// POST /api/v1/heartbeat
pub async fn heartbeat(
    State(state): State<ApiState>,
    Json(beat): Json<Heartbeat>,
) -> impl IntoResponse {
    match state.controller.heartbeat(beat).await {
        Ok(()) => Json(ApiResponse::ok("ok")).into_response(),
        Err(e) => scheduler_error(e),
    }
}

/// GET /api/v1/status
pub async fn status(State(state): State<ApiState>) -> impl IntoResponse {
    match state.controller.status().await {
        Ok(report) => Json(ApiResponse::ok(report)).into_response(),
        Err(e) => scheduler_error(e),
    }
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    Json(ApiResponse::ok("ok"))
}
