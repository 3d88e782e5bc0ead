//! HTTP clients for controller-to-worker and worker-to-controller calls.
//!
//! Every call opens a fresh HTTP/1 connection. Callers bound each call
//! with their own timeout.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tracing::debug;

use crack_core::{ApiResponse, Heartbeat, JobId, TaskAssignment};
use crackgrid_scheduler::WorkerClient;
use crackgrid_worker::ControllerClient;

const USER_AGENT: &str = concat!("crackgrid/", env!("CARGO_PKG_VERSION"));

/// POST `body` as JSON to `http://{address}{path}` and return the
/// envelope's `data` (`Null` when absent).
///
/// Fails on connection errors, non-2xx statuses and envelopes reporting
/// `success: false`.
pub async fn post_json<T: Serialize>(
    address: &str,
    path: &str,
    body: &T,
) -> anyhow::Result<serde_json::Value> {
    let payload = serde_json::to_vec(body)?;
    send(address, "POST", path, Full::new(Bytes::from(payload))).await
}

/// GET `http://{address}{path}` and return the envelope's `data`.
pub async fn get_json(address: &str, path: &str) -> anyhow::Result<serde_json::Value> {
    send(address, "GET", path, Full::new(Bytes::new())).await
}

async fn send(
    address: &str,
    method: &str,
    path: &str,
    body: Full<Bytes>,
) -> anyhow::Result<serde_json::Value> {
    let uri = format!("http://{address}{path}");

    let stream = tokio::net::TcpStream::connect(address).await?;
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "connection closed with error");
        }
    });

    let req = http::Request::builder()
        .method(method)
        .uri(&uri)
        .header("host", address)
        .header("user-agent", USER_AGENT)
        .header("content-type", "application/json")
        .body(body)?;

    let resp = sender.send_request(req).await?;
    let status = resp.status();
    let bytes = resp.into_body().collect().await?.to_bytes();

    let envelope: Option<ApiResponse<serde_json::Value>> = serde_json::from_slice(&bytes).ok();
    match envelope {
        Some(envelope) if status.is_success() && envelope.success => {
            Ok(envelope.data.unwrap_or_default())
        }
        None if status.is_success() => Ok(serde_json::Value::Null),
        envelope => {
            let reason = envelope
                .and_then(|e| e.error)
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());
            anyhow::bail!("{method} {uri} failed with {status}: {reason}")
        }
    }
}

/// Pushes tasks and kills to workers over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpWorkerClient;

impl WorkerClient for HttpWorkerClient {
    fn push_task(
        &self,
        address: String,
        assignment: TaskAssignment,
    ) -> crackgrid_scheduler::transport::BoxFuture<anyhow::Result<()>> {
        Box::pin(async move {
            post_json(&address, "/api/v1/tasks", &assignment).await?;
            Ok(())
        })
    }

    fn kill_job(
        &self,
        address: String,
        job_id: JobId,
    ) -> crackgrid_scheduler::transport::BoxFuture<anyhow::Result<()>> {
        Box::pin(async move {
            post_json(&address, &format!("/api/v1/jobs/{job_id}/kill"), &()).await?;
            Ok(())
        })
    }
}

/// Sends a worker's heartbeats to the controller over HTTP.
#[derive(Debug, Clone)]
pub struct HttpControllerClient {
    controller: String,
}

impl HttpControllerClient {
    pub fn new(controller: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
        }
    }
}

impl ControllerClient for HttpControllerClient {
    fn send_heartbeat(&self, beat: Heartbeat) -> crackgrid_worker::BoxFuture<anyhow::Result<()>> {
        let controller = self.controller.clone();
        Box::pin(async move {
            post_json(&controller, "/api/v1/heartbeat", &beat).await?;
            Ok(())
        })
    }
}
