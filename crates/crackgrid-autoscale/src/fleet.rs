//! Fleet controller — turns the slot gap into provisioner calls.
//!
//! The scheduler loop owns the controller and calls [`FleetController::reconcile`]
//! on every fleet tick. Provisioner calls run on spawned tasks; what they
//! learn (created handles, resolved addresses) comes back as
//! [`FleetEvent`]s the loop feeds into [`FleetController::record`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crack_core::FleetConfig;

use crate::pid::{PidController, instance_adjustment};
use crate::provisioner::{InstanceHandle, Provisioner};

/// Interval between address resolution attempts for a new instance.
const RESOLVE_INTERVAL: Duration = Duration::from_secs(10);

/// Resolution attempts before a new instance is given up on.
const RESOLVE_ATTEMPTS: u32 = 12;

/// Outcome of one fleet tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetDecision {
    /// Create this many instances.
    Grow(u32),
    /// Release instances, least-loaded first.
    Shrink {
        requested: u32,
        instances: Vec<InstanceHandle>,
    },
    /// No change needed.
    Hold,
}

/// Results of spawned provisioner calls, fed back into the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetEvent {
    Created(Vec<InstanceHandle>),
    Resolved {
        instance: InstanceHandle,
        address: String,
    },
}

pub struct FleetController {
    pid: PidController,
    slots_per_instance: u32,
    max_instances: u32,
    provisioner: Arc<dyn Provisioner>,
    events_tx: mpsc::Sender<FleetEvent>,
    /// Instances we created, with their worker address once resolved.
    instances: HashMap<InstanceHandle, Option<String>>,
    resolve_interval: Duration,
    resolve_attempts: u32,
}

impl FleetController {
    pub fn new(
        config: &FleetConfig,
        provisioner: Arc<dyn Provisioner>,
        events_tx: mpsc::Sender<FleetEvent>,
    ) -> Self {
        Self {
            pid: PidController::new(
                config.kp,
                config.ki,
                config.kd,
                config.interval.as_secs_f64(),
            ),
            slots_per_instance: config.slots_per_instance.max(1),
            max_instances: config.max_instances,
            provisioner,
            events_tx,
            instances: HashMap::new(),
            resolve_interval: RESOLVE_INTERVAL,
            resolve_attempts: RESOLVE_ATTEMPTS,
        }
    }

    /// Override how new instances are polled for their address.
    pub fn with_resolve_policy(mut self, interval: Duration, attempts: u32) -> Self {
        self.resolve_interval = interval;
        self.resolve_attempts = attempts;
        self
    }

    /// Run one PID iteration and decide on a fleet change.
    ///
    /// `workers_by_load` lists worker addresses ascending by assigned task
    /// count; scale-down picks from its front.
    pub fn decide(
        &mut self,
        required: u64,
        available: u64,
        workers_by_load: &[String],
    ) -> FleetDecision {
        let error = required as f64 - available as f64;
        let output = self.pid.step(error);
        let adjustment = instance_adjustment(output, self.slots_per_instance);
        debug!(required, available, error, output, adjustment, "fleet controller iteration");

        if adjustment > 0 {
            let room = self
                .max_instances
                .saturating_sub(self.instances.len() as u32);
            let grow = (adjustment as u64).min(u64::from(room)) as u32;
            if grow == 0 {
                debug!(adjustment, max_instances = self.max_instances, "fleet at its cap");
                return FleetDecision::Hold;
            }
            FleetDecision::Grow(grow)
        } else if adjustment < 0 {
            let requested = adjustment.unsigned_abs().min(u64::from(u32::MAX)) as u32;
            let instances = workers_by_load
                .iter()
                .filter_map(|address| self.instance_for(address))
                .take(requested as usize)
                .collect();
            FleetDecision::Shrink {
                requested,
                instances,
            }
        } else {
            FleetDecision::Hold
        }
    }

    /// Start the provisioner calls for a decision. Never blocks.
    pub fn apply(&mut self, decision: &FleetDecision) {
        match decision {
            FleetDecision::Grow(count) => self.spawn_create(*count),
            FleetDecision::Shrink {
                requested,
                instances,
            } => {
                if instances.is_empty() {
                    info!(requested, "scale-down wanted but no provisioned workers to release");
                    return;
                }
                for instance in instances {
                    self.instances.remove(instance);
                }
                let provisioner = self.provisioner.clone();
                let instances = instances.clone();
                let count = instances.len();
                info!(requested, count, "terminating least-loaded workers");
                tokio::spawn(async move {
                    match provisioner.terminate_instances(instances).await {
                        Ok(()) => info!(count, "instances terminated"),
                        Err(e) => warn!(count, error = %e, "failed to terminate instances"),
                    }
                });
            }
            FleetDecision::Hold => {}
        }
    }

    /// `decide` followed by `apply`.
    pub fn reconcile(
        &mut self,
        required: u64,
        available: u64,
        workers_by_load: &[String],
    ) -> FleetDecision {
        let decision = self.decide(required, available, workers_by_load);
        self.apply(&decision);
        decision
    }

    /// Fold a provisioner result into the instance map.
    pub fn record(&mut self, event: FleetEvent) {
        match event {
            FleetEvent::Created(handles) => {
                for handle in handles {
                    self.instances.entry(handle).or_insert(None);
                }
            }
            FleetEvent::Resolved { instance, address } => {
                // Ignore instances released while their address was pending.
                if let Some(slot) = self.instances.get_mut(&instance) {
                    info!(%instance, %address, "instance address resolved");
                    *slot = Some(address);
                }
            }
        }
    }

    /// The instance backing the worker at `address`, if we created it.
    pub fn instance_for(&self, address: &str) -> Option<InstanceHandle> {
        self.instances
            .iter()
            .find(|(_, a)| a.as_deref() == Some(address))
            .map(|(h, _)| h.clone())
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Terminate every instance we created (for graceful shutdown).
    pub async fn terminate_all(&mut self) {
        let instances: Vec<InstanceHandle> = self.instances.drain().map(|(h, _)| h).collect();
        if instances.is_empty() {
            return;
        }
        let count = instances.len();
        match self.provisioner.terminate_instances(instances).await {
            Ok(()) => info!(count, "all instances terminated"),
            Err(e) => warn!(count, error = %e, "failed to terminate instances on shutdown"),
        }
    }

    fn spawn_create(&self, count: u32) {
        let provisioner = self.provisioner.clone();
        let events_tx = self.events_tx.clone();
        let interval = self.resolve_interval;
        let attempts = self.resolve_attempts;

        info!(count, "requesting new instances");
        tokio::spawn(async move {
            let handles = match provisioner.create_instances(count).await {
                Ok(handles) => handles,
                Err(e) => {
                    warn!(count, error = %e, "failed to create instances");
                    return;
                }
            };
            info!(count = handles.len(), "instances created");
            if events_tx.send(FleetEvent::Created(handles.clone())).await.is_err() {
                return;
            }

            for instance in handles {
                let provisioner = provisioner.clone();
                let events_tx = events_tx.clone();
                tokio::spawn(async move {
                    resolve_instance(provisioner, instance, interval, attempts, events_tx).await;
                });
            }
        });
    }
}

/// Poll the provisioner until the instance has an address.
async fn resolve_instance(
    provisioner: Arc<dyn Provisioner>,
    instance: InstanceHandle,
    interval: Duration,
    attempts: u32,
    events_tx: mpsc::Sender<FleetEvent>,
) {
    for attempt in 1..=attempts {
        match provisioner.resolve_address(instance.clone()).await {
            Ok(Some(address)) => {
                let _ = events_tx.send(FleetEvent::Resolved { instance, address }).await;
                return;
            }
            Ok(None) => debug!(%instance, attempt, "instance address not ready"),
            Err(e) => warn!(%instance, attempt, error = %e, "failed to resolve instance address"),
        }
        tokio::time::sleep(interval).await;
    }
    warn!(%instance, attempts, "gave up resolving instance address");
}
