//! crackgrid-autoscale — PID-driven sizing of the worker fleet.
//!
//! Every fleet tick the scheduler hands the controller its required and
//! available slot counts. The PID output, in slots, is converted to whole
//! instances and turned into provisioner calls that run off the scheduler
//! loop.
//!
//! # Control Law
//!
//! ```text
//! required   = min(scheduled + queued, max_instances * slots_per_instance)
//! available  = Σ worker.slots
//! error      = required - available
//! integral  += error * dt
//! derivative = (error - prev_error) / dt
//! output     = kp * error + ki * integral + kd * derivative
//!
//! adjustment = ceil(output / slots_per_instance)
//!   > 0  create `adjustment` instances, resolve their addresses
//!   < 0  terminate the least-loaded workers with known instances
//! ```
//!
//! Scale-down never reassigns work itself: the terminated workers stop
//! heartbeating and the watchdog path reclaims their tasks.

pub mod fleet;
pub mod local;
pub mod pid;
pub mod provisioner;

pub use fleet::{FleetController, FleetDecision, FleetEvent};
pub use local::LocalProvisioner;
pub use pid::{PidController, instance_adjustment};
pub use provisioner::{BoxFuture, InstanceHandle, NoopProvisioner, Provisioner};
