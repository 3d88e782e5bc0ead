//! Local provisioner — runs workers as child processes on this host.
//!
//! Each instance is
//! `<binary> worker --port <p> --controller <addr> --slots <n> --heartbeat-interval <d>`
//! on consecutive ports starting at the configured base port. The heartbeat
//! interval is the controller's, so its watchdog timeout fits the workers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use anyhow::Context;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crack_core::config::format_duration;

use crate::provisioner::{BoxFuture, InstanceHandle, Provisioner};

struct LocalInstance {
    address: String,
    child: Child,
}

pub struct LocalProvisioner {
    binary: PathBuf,
    controller: String,
    slots: u32,
    heartbeat_interval: Duration,
    next_port: Arc<AtomicU16>,
    instances: Arc<Mutex<HashMap<InstanceHandle, LocalInstance>>>,
}

impl LocalProvisioner {
    /// `controller` is the address spawned workers send heartbeats to.
    pub fn new(binary: PathBuf, controller: String, slots: u32, base_port: u16) -> Self {
        Self {
            binary,
            controller,
            slots,
            heartbeat_interval: Duration::from_secs(5),
            next_port: Arc::new(AtomicU16::new(base_port)),
            instances: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Heartbeat interval handed to spawned workers.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Command-line arguments of the worker listening on `port`.
    fn worker_args(&self, port: u16) -> Vec<String> {
        vec![
            "worker".to_string(),
            "--port".to_string(),
            port.to_string(),
            "--controller".to_string(),
            self.controller.clone(),
            "--slots".to_string(),
            self.slots.to_string(),
            "--heartbeat-interval".to_string(),
            format_duration(self.heartbeat_interval),
        ]
    }

    /// Number of live child processes.
    pub async fn instance_count(&self) -> usize {
        self.instances.lock().await.len()
    }
}

impl Provisioner for LocalProvisioner {
    fn create_instances(&self, count: u32) -> BoxFuture<anyhow::Result<Vec<InstanceHandle>>> {
        let binary = self.binary.clone();
        let instances = self.instances.clone();
        let launches: Vec<(u16, Vec<String>)> = (0..count)
            .map(|_| {
                let port = self.next_port.fetch_add(1, Ordering::Relaxed);
                (port, self.worker_args(port))
            })
            .collect();

        Box::pin(async move {
            let mut handles = Vec::with_capacity(launches.len());
            for (port, args) in launches {
                let child = Command::new(&binary)
                    .args(&args)
                    .stdin(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                    .with_context(|| format!("failed to spawn {}", binary.display()))?;

                let handle = InstanceHandle(format!("local-{port}"));
                let address = format!("127.0.0.1:{port}");
                debug!(instance = %handle, %address, pid = ?child.id(), "worker process spawned");
                instances
                    .lock()
                    .await
                    .insert(handle.clone(), LocalInstance { address, child });
                handles.push(handle);
            }
            info!(count, "local workers started");
            Ok(handles)
        })
    }

    fn terminate_instances(&self, handles: Vec<InstanceHandle>) -> BoxFuture<anyhow::Result<()>> {
        let instances = self.instances.clone();

        Box::pin(async move {
            let removed: Vec<(InstanceHandle, LocalInstance)> = {
                let mut instances = instances.lock().await;
                handles
                    .into_iter()
                    .filter_map(|h| instances.remove(&h).map(|inst| (h, inst)))
                    .collect()
            };

            for (handle, mut instance) in removed {
                if let Err(e) = instance.child.kill().await {
                    warn!(instance = %handle, error = %e, "failed to kill worker process");
                } else {
                    debug!(instance = %handle, address = %instance.address, "worker process killed");
                }
            }
            Ok(())
        })
    }

    fn resolve_address(&self, instance: InstanceHandle) -> BoxFuture<anyhow::Result<Option<String>>> {
        let instances = self.instances.clone();

        Box::pin(async move {
            let mut instances = instances.lock().await;
            let Some(local) = instances.get_mut(&instance) else {
                return Ok(None);
            };
            // An exited child has no address to hand out.
            match local.child.try_wait()? {
                None => Ok(Some(local.address.clone())),
                Some(status) => {
                    warn!(%instance, %status, "worker process exited");
                    Ok(None)
                }
            }
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    // `cat` exits quickly on the worker arguments, but spawning is all
    // these tests need.
    fn provisioner(binary: &str) -> LocalProvisioner {
        LocalProvisioner::new(binary.into(), "127.0.0.1:8080".into(), 2, 19100)
    }

    #[test]
    fn workers_inherit_the_heartbeat_interval() {
        let p = provisioner("/nonexistent/crackd")
            .with_heartbeat_interval(Duration::from_millis(1500));
        assert_eq!(
            p.worker_args(19100),
            vec![
                "worker",
                "--port",
                "19100",
                "--controller",
                "127.0.0.1:8080",
                "--slots",
                "2",
                "--heartbeat-interval",
                "1500ms",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let p = provisioner("/nonexistent/crackd");
        assert!(p.create_instances(1).await.is_err());
        assert_eq!(p.instance_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_handle_resolves_to_nothing() {
        let p = provisioner("/nonexistent/crackd");
        let addr = p
            .resolve_address(InstanceHandle("local-1".into()))
            .await
            .unwrap();
        assert_eq!(addr, None);
    }

    #[tokio::test]
    async fn spawned_children_are_tracked_and_killed() {
        let p = provisioner("/bin/cat");
        let handles = p.create_instances(2).await.unwrap();
        assert_eq!(
            handles,
            vec![
                InstanceHandle("local-19100".into()),
                InstanceHandle("local-19101".into())
            ]
        );
        assert_eq!(p.instance_count().await, 2);

        p.terminate_instances(handles).await.unwrap();
        assert_eq!(p.instance_count().await, 0);
    }
}
