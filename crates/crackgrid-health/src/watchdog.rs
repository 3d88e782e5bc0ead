//! Watchdog — one background task per worker that turns heartbeat
//! silence into a [`WorkerMissed`] event.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A worker stayed silent past its heartbeat timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerMissed {
    pub address: String,
    /// Registration generation the watchdog was started for.
    pub generation: u64,
}

/// Handle to a single running watchdog.
pub struct Watchdog {
    beat_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Watchdog {
    /// Spawn a watchdog that reports on `miss_tx` after `timeout` of silence.
    pub fn spawn(
        address: String,
        generation: u64,
        timeout: Duration,
        miss_tx: mpsc::Sender<WorkerMissed>,
    ) -> Self {
        // One pending beat is enough to reset the timer.
        let (beat_tx, beat_rx) = mpsc::channel(1);
        let handle = tokio::spawn(run_watchdog(address, generation, timeout, beat_rx, miss_tx));
        Self { beat_tx, handle }
    }

    /// Reset the timer. Never blocks.
    pub fn feed(&self) {
        // Full means a beat is already pending; closed means the watchdog
        // has fired. Neither needs handling here.
        let _ = self.beat_tx.try_send(());
    }

    /// Whether the watchdog task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

async fn run_watchdog(
    address: String,
    generation: u64,
    timeout: Duration,
    mut beats: mpsc::Receiver<()>,
    miss_tx: mpsc::Sender<WorkerMissed>,
) {
    debug!(%address, generation, ?timeout, "watchdog starting");

    loop {
        tokio::select! {
            beat = beats.recv() => {
                if beat.is_none() {
                    debug!(%address, generation, "watchdog released");
                    return;
                }
            }
            _ = tokio::time::sleep(timeout) => {
                warn!(%address, generation, ?timeout, "worker missed its heartbeat");
                let _ = miss_tx.send(WorkerMissed { address, generation }).await;
                return;
            }
        }
    }
}

/// All watchdogs of a controller, keyed by worker address.
pub struct WatchdogSet {
    timeout: Duration,
    miss_tx: mpsc::Sender<WorkerMissed>,
    watchdogs: HashMap<String, Watchdog>,
}

impl WatchdogSet {
    pub fn new(timeout: Duration, miss_tx: mpsc::Sender<WorkerMissed>) -> Self {
        Self {
            timeout,
            miss_tx,
            watchdogs: HashMap::new(),
        }
    }

    /// Start watching `address`, replacing any previous watchdog for it.
    pub fn start(&mut self, address: &str, generation: u64) {
        let watchdog = Watchdog::spawn(
            address.to_string(),
            generation,
            self.timeout,
            self.miss_tx.clone(),
        );
        if let Some(old) = self.watchdogs.insert(address.to_string(), watchdog) {
            old.stop();
        }
        info!(%address, generation, "watchdog started");
    }

    /// Forward a heartbeat. Returns `false` if `address` is not watched.
    pub fn feed(&self, address: &str) -> bool {
        match self.watchdogs.get(address) {
            Some(watchdog) => {
                watchdog.feed();
                true
            }
            None => false,
        }
    }

    pub fn stop(&mut self, address: &str) {
        if let Some(watchdog) = self.watchdogs.remove(address) {
            watchdog.stop();
            debug!(%address, "watchdog stopped");
        }
    }

    /// Stop all watchdogs (for graceful shutdown).
    pub fn stop_all(&mut self) {
        for (address, watchdog) in self.watchdogs.drain() {
            watchdog.stop();
            debug!(%address, "watchdog stopped");
        }
    }

    pub fn is_watching(&self, address: &str) -> bool {
        self.watchdogs.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.watchdogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchdogs.is_empty()
    }
}
