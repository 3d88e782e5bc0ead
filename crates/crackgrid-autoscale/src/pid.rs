//! Discrete PID controller.

/// Keeps the integral and previous error between iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    /// Seconds between iterations.
    dt: f64,
    integral: f64,
    prev_error: f64,
}

impl PidController {
    pub fn new(kp: f64, ki: f64, kd: f64, dt: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            dt,
            integral: 0.0,
            prev_error: 0.0,
        }
    }

    /// Run one iteration and return the controller output.
    pub fn step(&mut self, error: f64) -> f64 {
        self.integral += error * self.dt;
        let derivative = if self.dt > 0.0 {
            (error - self.prev_error) / self.dt
        } else {
            0.0
        };
        self.prev_error = error;
        self.kp * error + self.ki * self.integral + self.kd * derivative
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }
}

/// Convert a slot-denominated output into whole instances.
///
/// Rounds toward positive infinity so a fractional deficit still asks for
/// an instance. The epsilon keeps exact multiples from rounding up through
/// floating-point noise.
pub fn instance_adjustment(output: f64, slots_per_instance: u32) -> i64 {
    let slots = f64::from(slots_per_instance.max(1));
    (output / slots - 1.11e-16).ceil() as i64
}
