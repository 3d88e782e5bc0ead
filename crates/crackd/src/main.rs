//! crackd — the crackgrid daemon.
//!
//! # Usage
//!
//! ```text
//! crackd controller --config crackgrid.toml --port 8080
//! crackd worker --controller 10.0.0.1:8080 --port 8081 --slots 4
//! crackd submit --controller 10.0.0.1:8080 --salt 73616c74 --password abcd
//! crackd submit --controller 10.0.0.1:8080 --random --jobs 10 --interval 30s
//! crackd collect --controller 10.0.0.1:8080 --interval 10s --output status.json
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crack_core::{Alphabet, ProvisionerKind};
use crackd::submit::{JobSource, JobTemplate};
use crackd::{collect, controller_mode, parse_duration_arg, shutdown_on_ctrl_c, submit, worker_mode};

#[derive(Parser)]
#[command(name = "crackd", about = "crackgrid distributed password recovery daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller (scheduler, fleet controller, REST API).
    Controller {
        /// Configuration file (TOML).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on.
        #[arg(long)]
        port: Option<u16>,

        /// Address workers use to reach this controller.
        #[arg(long)]
        advertise_address: Option<String>,

        /// Fleet provisioner.
        #[arg(long, value_parser = ["none", "local"])]
        provisioner: Option<String>,

        /// Print the effective configuration and exit.
        #[arg(long)]
        print_config: bool,
    },

    /// Run a worker.
    Worker {
        /// Configuration file (TOML).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on.
        #[arg(long)]
        port: Option<u16>,

        /// Controller address (`host:port`).
        #[arg(long)]
        controller: Option<String>,

        /// Tasks to run concurrently.
        #[arg(long)]
        slots: Option<u32>,

        /// Address the controller uses to reach this worker.
        #[arg(long)]
        advertise_address: Option<String>,

        /// Time between heartbeats (e.g. `5s`).
        #[arg(long, value_parser = parse_duration_arg)]
        heartbeat_interval: Option<Duration>,
    },

    /// Submit jobs to a controller.
    Submit {
        /// Controller address (`host:port`).
        #[arg(long, default_value = "127.0.0.1:8080")]
        controller: String,

        /// Generate a random password and salt for every job.
        #[arg(long, conflicts_with_all = ["salt", "digest", "password"])]
        random: bool,

        /// Jobs to submit.
        #[arg(long, default_value_t = 1)]
        jobs: u32,

        /// Time between submissions.
        #[arg(long, default_value = "60s", value_parser = parse_duration_arg)]
        interval: Duration,

        /// Salt, hex encoded.
        #[arg(long, required_unless_present = "random")]
        salt: Option<String>,

        /// Target digest, hex encoded.
        #[arg(long, conflicts_with = "password")]
        digest: Option<String>,

        /// Password to derive the target digest from.
        #[arg(long)]
        password: Option<String>,

        /// Password length.
        #[arg(long, default_value_t = 4)]
        key_len: usize,

        /// PBKDF2 iterations.
        #[arg(long, default_value_t = 2000)]
        iterations: u32,

        /// Character set (`numerical`, `alpha_lower`, ...).
        #[arg(long, default_value = "alpha_lower")]
        alphabet: Alphabet,

        /// Cap on the job's concurrently scheduled tasks.
        #[arg(long)]
        max_concurrent_tasks: Option<u32>,
    },

    /// Sample the controller's status report into a JSON file.
    Collect {
        /// Controller address (`host:port`).
        #[arg(long, default_value = "127.0.0.1:8080")]
        controller: String,

        /// Time between samples.
        #[arg(long, default_value = "10s", value_parser = parse_duration_arg)]
        interval: Duration,

        /// File the samples are written to.
        #[arg(long)]
        output: PathBuf,

        /// Stop after this many samples.
        #[arg(long)]
        samples: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Controller {
            config,
            port,
            advertise_address,
            provisioner,
            print_config,
        } => {
            let mut config = controller_mode::load_config(config)?;
            if let Some(port) = port {
                config.port = port;
            }
            if advertise_address.is_some() {
                config.advertise_address = advertise_address;
            }
            match provisioner.as_deref() {
                Some("local") => config.fleet.provisioner = ProvisionerKind::Local,
                Some(_) => config.fleet.provisioner = ProvisionerKind::None,
                None => {}
            }
            config.validate()?;
            if print_config {
                print!("{}", config.to_toml_string()?);
                return Ok(());
            }
            controller_mode::run_controller(config).await
        }
        Command::Worker {
            config,
            port,
            controller,
            slots,
            advertise_address,
            heartbeat_interval,
        } => {
            let mut config = worker_mode::load_config(config)?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(controller) = controller {
                config.controller = controller;
            }
            if let Some(slots) = slots {
                config.slots = slots;
            }
            if advertise_address.is_some() {
                config.advertise_address = advertise_address;
            }
            if let Some(interval) = heartbeat_interval {
                config.heartbeat_interval = interval;
            }
            config.validate()?;
            worker_mode::run_worker(config).await
        }
        Command::Submit {
            controller,
            random,
            jobs,
            interval,
            salt,
            digest,
            password,
            key_len,
            iterations,
            alphabet,
            max_concurrent_tasks,
        } => {
            let template = JobTemplate {
                alphabet,
                key_len,
                iterations,
                max_concurrent_tasks,
                ..JobTemplate::default()
            };
            let source = if random {
                JobSource::Random(template)
            } else {
                let salt = hex::decode(salt.unwrap_or_default())?;
                let request = match (digest, password) {
                    (Some(digest), _) => template.with_digest(salt, hex::decode(digest)?),
                    (None, Some(password)) => template.for_password(salt, &password)?,
                    (None, None) => anyhow::bail!("either --digest or --password is required"),
                };
                request.validate()?;
                JobSource::Fixed(request)
            };
            submit::run_submit(&controller, &source, jobs, interval, shutdown_on_ctrl_c())
                .await?;
            Ok(())
        }
        Command::Collect {
            controller,
            interval,
            output,
            samples,
        } => {
            collect::run_collect(&controller, interval, &output, samples, shutdown_on_ctrl_c())
                .await?;
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,crackd=debug,crackgrid=debug"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn worker_takes_a_heartbeat_interval() {
        let cli = Cli::try_parse_from(["crackd", "worker", "--heartbeat-interval", "750ms"]).unwrap();
        let Command::Worker { heartbeat_interval, .. } = cli.command else {
            panic!("expected the worker command");
        };
        assert_eq!(heartbeat_interval, Some(Duration::from_millis(750)));

        assert!(Cli::try_parse_from(["crackd", "worker", "--heartbeat-interval", "0s"]).is_err());
    }

    #[test]
    fn submit_needs_a_salt_unless_random() {
        assert!(Cli::try_parse_from(["crackd", "submit", "--password", "abcd"]).is_err());
        assert!(Cli::try_parse_from(["crackd", "submit", "--random", "--salt", "00"]).is_err());

        let cli = Cli::try_parse_from(["crackd", "submit", "--random", "--jobs", "3", "--alphabet", "numerical"])
            .unwrap();
        let Command::Submit { random, jobs, alphabet, interval, .. } = cli.command else {
            panic!("expected the submit command");
        };
        assert!(random);
        assert_eq!(jobs, 3);
        assert_eq!(alphabet, Alphabet::Numerical);
        assert_eq!(interval, Duration::from_secs(60));
    }
}
