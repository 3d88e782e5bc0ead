//! Job submission client.
//!
//! Sends one fixed job, or a series of randomly generated PBKDF2 jobs at a
//! fixed interval, to a controller's `POST /api/v1/jobs`.

use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tracing::info;

use crack_core::{Algorithm, Alphabet, Candidate, JobId, JobRequest};
use crackgrid_api::client::post_json;

/// Longest random salt, in bytes.
const MAX_SALT_LEN: usize = 6;

/// Job parameters shared by every submitted job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobTemplate {
    pub alphabet: Alphabet,
    pub key_len: usize,
    pub iterations: u32,
    pub algorithm: Algorithm,
    pub max_concurrent_tasks: Option<u32>,
}

impl Default for JobTemplate {
    fn default() -> Self {
        Self {
            alphabet: Alphabet::AlphaLower,
            key_len: 4,
            iterations: 2000,
            algorithm: Algorithm::Pbkdf2Sha256,
            max_concurrent_tasks: None,
        }
    }
}

impl JobTemplate {
    /// A job for a known digest.
    pub fn with_digest(&self, salt: Vec<u8>, digest: Vec<u8>) -> JobRequest {
        JobRequest {
            salt,
            digest,
            key_len: self.key_len,
            iterations: self.iterations,
            alphabet: self.alphabet,
            algorithm: self.algorithm,
            max_concurrent_tasks: self.max_concurrent_tasks,
        }
    }

    /// A job whose digest is derived from `password`.
    pub fn for_password(&self, salt: Vec<u8>, password: &str) -> anyhow::Result<JobRequest> {
        if password.len() != self.key_len {
            anyhow::bail!(
                "password has {} characters, the key length is {}",
                password.len(),
                self.key_len
            );
        }
        if !self.alphabet.contains(&Candidate::from(password)) {
            anyhow::bail!("password is not in the {} alphabet", self.alphabet);
        }
        let digest = self.digest(&salt, password.as_bytes());
        Ok(self.with_digest(salt, digest))
    }

    /// A job for a random password and salt. Returns the password too.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> (JobRequest, String) {
        let mut salt = vec![0u8; rng.gen_range(1..=MAX_SALT_LEN)];
        rng.fill(&mut salt[..]);

        let chars = self.alphabet.chars();
        let password: String = (0..self.key_len)
            .map(|_| chars[rng.gen_range(0..chars.len())] as char)
            .collect();

        let digest = self.digest(&salt, password.as_bytes());
        (self.with_digest(salt, digest), password)
    }

    fn digest(&self, salt: &[u8], password: &[u8]) -> Vec<u8> {
        self.algorithm.hasher().hash(password, salt, self.iterations, 32)
    }
}

/// What `submit` sends.
#[derive(Debug, Clone)]
pub enum JobSource {
    Fixed(JobRequest),
    Random(JobTemplate),
}

/// Submit `jobs` jobs, waiting `interval` between them.
///
/// Stops early when `shutdown` fires. Returns the ids the controller
/// assigned.
pub async fn run_submit(
    controller: &str,
    source: &JobSource,
    jobs: u32,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Vec<JobId>> {
    let mut ids = Vec::with_capacity(jobs as usize);
    for n in 0..jobs {
        if n > 0 {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        let (request, password) = match source {
            JobSource::Fixed(request) => (request.clone(), None),
            JobSource::Random(template) => {
                let (request, password) = template.random(&mut rand::thread_rng());
                (request, Some(password))
            }
        };

        let data = post_json(controller, "/api/v1/jobs", &request).await?;
        let job_id = data["job_id"]
            .as_u64()
            .ok_or_else(|| anyhow::anyhow!("controller reply carries no job id: {data}"))?;
        info!(
            job_id,
            alphabet = %request.alphabet,
            key_len = request.key_len,
            iterations = request.iterations,
            password = password.as_deref().unwrap_or("-"),
            "job submitted"
        );
        ids.push(job_id);
    }
    Ok(ids)
}
