//! Status collector.
//!
//! Polls the controller's `GET /api/v1/status` at a fixed interval and
//! writes the samples to a file as one JSON array:
//!
//! ```text
//! [{"timestamp":1700000000,"status":{...}}
//! ,{"timestamp":1700000010,"status":{...}}
//! ]
//! ```
//!
//! The array is closed on shutdown, so the file is valid JSON once the
//! collector exits.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crack_core::epoch_secs;
use crackgrid_api::client::get_json;

#[derive(Serialize)]
struct Sample {
    timestamp: u64,
    status: serde_json::Value,
}

/// Collect until `shutdown` fires or `samples` samples are written.
///
/// A failed poll is logged and skipped. Returns the number of samples
/// written.
pub async fn run_collect(
    controller: &str,
    interval: Duration,
    output: &Path,
    samples: Option<u64>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<u64> {
    let mut file = tokio::fs::File::create(output).await?;
    file.write_all(b"[").await?;
    info!(%controller, output = %output.display(), ?interval, "collecting status reports");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut written = 0u64;

    while samples.is_none_or(|max| written < max) {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let status = match get_json(controller, "/api/v1/status").await {
            Ok(status) => status,
            Err(e) => {
                warn!(%controller, error = %e, "status poll failed");
                continue;
            }
        };
        let sample = Sample {
            timestamp: epoch_secs(),
            status,
        };
        if written > 0 {
            file.write_all(b"\n,").await?;
        }
        file.write_all(&serde_json::to_vec(&sample)?).await?;
        file.flush().await?;
        written += 1;
        debug!(written, "status sample written");
    }

    file.write_all(b"]\n").await?;
    file.flush().await?;
    info!(written, output = %output.display(), "collector stopped");
    Ok(written)
}
