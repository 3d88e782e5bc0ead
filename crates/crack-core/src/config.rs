//! crackgrid.toml configuration for the controller and workers.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Durations are written as `"5s"`, `"500ms"` or `"2m"`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Port for the controller's HTTP API.
    pub port: u16,
    /// Address workers use to reach the controller (`host:port`).
    pub advertise_address: Option<String>,
    /// Interval at which workers send heartbeats.
    #[serde(with = "duration_str")]
    pub heartbeat_interval: Duration,
    /// Silence after which a worker is declared dead.
    #[serde(with = "duration_str")]
    pub heartbeat_timeout: Duration,
    /// Assignment tick period with an empty queue; shrinks as it grows.
    #[serde(with = "duration_str")]
    pub schedule_interval: Duration,
    /// Bound on a single task push or kill request.
    #[serde(with = "duration_str")]
    pub push_timeout: Duration,
    /// Raw hash iterations a single task should cost.
    pub task_budget: u64,
    /// Default cap on a job's simultaneously assigned tasks.
    pub max_concurrent_tasks: u32,
    pub fleet: FleetConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            advertise_address: None,
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(10),
            schedule_interval: Duration::from_millis(100),
            push_timeout: Duration::from_secs(5),
            task_budget: 284_000_000,
            max_concurrent_tasks: 4,
            fleet: FleetConfig::default(),
        }
    }
}

/// Which provisioner backs the fleet controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionerKind {
    /// Log scaling decisions without acting on them.
    #[default]
    None,
    /// Spawn `crackd worker` processes on this host.
    Local,
}

/// PID fleet controller and provisioner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    #[serde(with = "duration_str")]
    pub interval: Duration,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Task slots provided by one worker instance.
    pub slots_per_instance: u32,
    /// Hard cap on the fleet size.
    pub max_instances: u32,
    pub provisioner: ProvisionerKind,
    /// Worker executable for the local provisioner (defaults to this binary).
    pub worker_binary: Option<PathBuf>,
    /// First port handed to locally spawned workers.
    pub base_port: u16,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(150),
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            slots_per_instance: 2,
            max_instances: 20,
            provisioner: ProvisionerKind::None,
            worker_binary: None,
            base_port: 9000,
        }
    }
}

impl FleetConfig {
    /// Upper bound on required slots.
    pub fn fleet_cap(&self) -> u64 {
        u64::from(self.max_instances) * u64::from(self.slots_per_instance)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Port for the worker's HTTP API.
    pub port: u16,
    /// Address the controller uses to reach this worker (`host:port`).
    pub advertise_address: Option<String>,
    /// Controller `host:port`.
    pub controller: String,
    /// Tasks this worker runs concurrently.
    pub slots: u32,
    #[serde(with = "duration_str")]
    pub heartbeat_interval: Duration,
    /// Bound on a single heartbeat request.
    #[serde(with = "duration_str")]
    pub heartbeat_timeout: Duration,
    /// How long a running task may take to answer a progress query.
    #[serde(with = "duration_str")]
    pub progress_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            advertise_address: None,
            controller: "127.0.0.1:8080".to_string(),
            slots: 2,
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(5),
            progress_timeout: Duration::from_secs(1),
        }
    }
}

impl WorkerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the worker cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("heartbeat_interval", self.heartbeat_interval),
            ("heartbeat_timeout", self.heartbeat_timeout),
            ("progress_timeout", self.progress_timeout),
        ] {
            if value.is_zero() {
                anyhow::bail!("{name} must be greater than zero");
            }
        }
        if self.slots == 0 {
            anyhow::bail!("slots must be at least 1");
        }
        Ok(())
    }

    /// The address reported in heartbeats.
    pub fn address(&self) -> String {
        self.advertise_address
            .clone()
            .unwrap_or_else(|| format!("127.0.0.1:{}", self.port))
    }
}

impl ControllerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the controller cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("heartbeat_interval", self.heartbeat_interval),
            ("heartbeat_timeout", self.heartbeat_timeout),
            ("schedule_interval", self.schedule_interval),
            ("push_timeout", self.push_timeout),
            ("fleet.interval", self.fleet.interval),
        ] {
            if value.is_zero() {
                anyhow::bail!("{name} must be greater than zero");
            }
        }
        if self.heartbeat_timeout <= self.heartbeat_interval {
            anyhow::bail!(
                "heartbeat_timeout ({}) must exceed heartbeat_interval ({})",
                format_duration(self.heartbeat_timeout),
                format_duration(self.heartbeat_interval)
            );
        }
        if self.max_concurrent_tasks == 0 {
            anyhow::bail!("max_concurrent_tasks must be at least 1");
        }
        if self.fleet.slots_per_instance == 0 {
            anyhow::bail!("fleet.slots_per_instance must be at least 1");
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The address reported to spawned workers.
    pub fn address(&self) -> String {
        self.advertise_address
            .clone()
            .unwrap_or_else(|| format!("127.0.0.1:{}", self.port))
    }
}

/// Parse a duration string like "5s", "500ms", "2m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Render a duration in the shortest unit that represents it exactly.
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms % 60_000 == 0 && ms > 0 {
        format!("{}m", ms / 60_000)
    } else if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{ms}ms")
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(d)?;
        match super::parse_duration(&s) {
            Some(d) if d.is_zero() => Err(serde::de::Error::custom(format!(
                "duration must be greater than zero: {s:?}"
            ))),
            Some(d) => Ok(d),
            None => Err(serde::de::Error::custom(format!("invalid duration: {s:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: ControllerConfig = toml::from_str("").unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.heartbeat_timeout, 2 * config.heartbeat_interval);
        assert_eq!(config.fleet.fleet_cap(), 40);

        let worker: WorkerConfig = toml::from_str("").unwrap();
        assert_eq!(worker, WorkerConfig::default());
        assert_eq!(worker.address(), "127.0.0.1:8081");
    }

    #[test]
    fn parse_controller_file() {
        let toml_str = r#"
port = 9090
heartbeat_interval = "2s"
heartbeat_timeout = "4500ms"
max_concurrent_tasks = 8

[fleet]
interval = "1m"
kp = 0.5
slots_per_instance = 4
provisioner = "local"
"#;
        let config: ControllerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(2));
        assert_eq!(config.heartbeat_timeout, Duration::from_millis(4500));
        assert_eq!(config.max_concurrent_tasks, 8);
        assert_eq!(config.fleet.interval, Duration::from_secs(60));
        assert_eq!(config.fleet.kp, 0.5);
        assert_eq!(config.fleet.ki, 0.0);
        assert_eq!(config.fleet.provisioner, ProvisionerKind::Local);
        assert_eq!(config.task_budget, 284_000_000);
    }

    #[test]
    fn invalid_duration_is_an_error() {
        let err = toml::from_str::<WorkerConfig>("heartbeat_interval = \"soon\"");
        assert!(err.is_err());
    }

    #[test]
    fn from_file_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crackgrid.toml");
        let mut config = ControllerConfig::default();
        config.schedule_interval = Duration::from_millis(250);
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = ControllerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn zero_durations_are_rejected() {
        let err = toml::from_str::<WorkerConfig>("heartbeat_interval = \"0s\"").unwrap_err();
        assert!(err.to_string().contains("greater than zero"), "{err}");
        assert!(toml::from_str::<ControllerConfig>("[fleet]\ninterval = \"0ms\"").is_err());

        let config = ControllerConfig {
            schedule_interval: Duration::ZERO,
            ..ControllerConfig::default()
        };
        assert!(config.validate().is_err());
        let worker = WorkerConfig {
            progress_timeout: Duration::ZERO,
            ..WorkerConfig::default()
        };
        assert!(worker.validate().is_err());
    }

    #[test]
    fn validate_checks_relations_and_counts() {
        assert!(ControllerConfig::default().validate().is_ok());
        assert!(WorkerConfig::default().validate().is_ok());

        let config = ControllerConfig {
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(5),
            ..ControllerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must exceed"), "{err}");

        let mut config = ControllerConfig::default();
        config.fleet.slots_per_instance = 0;
        assert!(config.validate().is_err());

        let worker = WorkerConfig {
            slots: 0,
            ..WorkerConfig::default()
        };
        assert!(worker.validate().is_err());
    }

    #[test]
    fn from_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crackgrid.toml");
        std::fs::write(&path, "heartbeat_interval = \"20s\"\n").unwrap();
        assert!(ControllerConfig::from_file(&path).is_err());
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("invalid"), None);
    }

    #[test]
    fn format_duration_values() {
        assert_eq!(format_duration(Duration::from_secs(150)), "150s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_millis(100)), "100ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }
}
