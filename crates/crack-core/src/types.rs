//! Wire documents exchanged between clients, the controller and workers.
//!
//! Binary values (salt, digest) travel as lowercase hex. Task lengths can
//! exceed 64 bits and travel as decimal strings.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alphabet::Alphabet;
use crate::codec::Candidate;
use crate::hasher::Algorithm;

/// Controller-assigned job identifier.
pub type JobId = u64;

/// Ordinal of a task within its job.
pub type TaskId = u64;

/// Longest candidate a job may ask for.
pub const MAX_KEY_LEN: usize = 64;

// ── Job submission ─────────────────────────────────────────────────

/// A cracking job as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRequest {
    #[serde(with = "hex_bytes")]
    pub salt: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub digest: Vec<u8>,
    /// Length of every candidate password.
    pub key_len: usize,
    /// KDF iteration count.
    pub iterations: u32,
    pub alphabet: Alphabet,
    #[serde(default)]
    pub algorithm: Algorithm,
    /// Overrides the controller's per-job concurrency cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_tasks: Option<u32>,
}

/// Reasons a job request is rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("digest must not be empty")]
    EmptyDigest,

    #[error("key length must be between 1 and {max}, got {0}", max = MAX_KEY_LEN)]
    KeyLength(usize),

    #[error("iteration count must be at least 1")]
    ZeroIterations,

    #[error("max_concurrent_tasks must be at least 1")]
    ZeroConcurrency,

    #[error(transparent)]
    Partition(#[from] crate::partition::PartitionError),
}

impl JobRequest {
    /// Check the request's own fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.digest.is_empty() {
            return Err(ValidationError::EmptyDigest);
        }
        if self.key_len == 0 || self.key_len > MAX_KEY_LEN {
            return Err(ValidationError::KeyLength(self.key_len));
        }
        if self.iterations == 0 {
            return Err(ValidationError::ZeroIterations);
        }
        if self.max_concurrent_tasks == Some(0) {
            return Err(ValidationError::ZeroConcurrency);
        }
        Ok(())
    }
}

// ── Task assignment ────────────────────────────────────────────────

/// Everything a worker needs to run one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskAssignment {
    pub job_id: JobId,
    pub task_id: TaskId,
    #[serde(with = "hex_bytes")]
    pub salt: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub digest: Vec<u8>,
    pub key_len: usize,
    pub iterations: u32,
    pub alphabet: Alphabet,
    pub algorithm: Algorithm,
    pub start: Candidate,
    #[serde(with = "decimal")]
    pub task_len: BigUint,
    /// Resume point when the task is redelivered after a worker loss.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Candidate>,
}

// ── Heartbeat ──────────────────────────────────────────────────────

/// Lifecycle of a task as seen by its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    PasswordFound,
    PasswordNotFound,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

/// One task's state inside a heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatusReport {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Candidate>,
}

/// Periodic liveness signal from a worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Heartbeat {
    /// The worker's advertised `host:port`; also its identity.
    pub address: String,
    /// Number of tasks the worker runs concurrently.
    pub slots: u32,
    #[serde(default)]
    pub statuses: Vec<TaskStatusReport>,
}

// ── Status report ──────────────────────────────────────────────────

/// Snapshot of the controller's state for external reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusReport {
    pub required_slots: u64,
    pub available_slots: u64,
    pub queued_tasks: usize,
    pub scheduled_tasks: usize,
    pub workers: Vec<WorkerSummary>,
    pub jobs: Vec<JobSummary>,
    pub completed_jobs: Vec<JobSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerSummary {
    pub address: String,
    pub slots: u32,
    pub tasks: Vec<TaskSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSummary {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub start: Candidate,
    #[serde(with = "decimal")]
    pub task_len: BigUint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Candidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub id: JobId,
    #[serde(with = "hex_bytes")]
    pub salt: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub digest: Vec<u8>,
    pub key_len: usize,
    pub iterations: u32,
    pub alphabet: Alphabet,
    pub algorithm: Algorithm,
    pub max_concurrent_tasks: u32,
    pub running_tasks: u32,
    pub tasks: Vec<TaskSummary>,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
}

// ── Response envelope ──────────────────────────────────────────────

/// Envelope wrapped around every HTTP response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

// ── Serde helpers ──────────────────────────────────────────────────

/// Bytes as a lowercase hex string.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s.trim()).map_err(serde::de::Error::custom)
    }
}

/// Arbitrary-precision unsigned integers as decimal strings.
pub mod decimal {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(n: &BigUint, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&n.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(d)?;
        BigUint::parse_bytes(s.trim().as_bytes(), 10)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid decimal integer: {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> JobRequest {
        JobRequest {
            salt: b"salt".to_vec(),
            digest: vec![0xab; 32],
            key_len: 4,
            iterations: 1,
            alphabet: Alphabet::AlphaLower,
            algorithm: Algorithm::Pbkdf2Sha256,
            max_concurrent_tasks: None,
        }
    }

    #[test]
    fn job_request_parses_from_client_json() {
        let json = r#"{
            "salt": "73616c74",
            "digest": "abab",
            "key_len": 4,
            "iterations": 2000,
            "alphabet": "alpha_lower"
        }"#;
        let req: JobRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.salt, b"salt");
        assert_eq!(req.digest, vec![0xab, 0xab]);
        assert_eq!(req.algorithm, Algorithm::Pbkdf2Sha256);
        assert_eq!(req.max_concurrent_tasks, None);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn bad_hex_is_rejected() {
        let json = r#"{"salt":"zz","digest":"ab","key_len":4,"iterations":1,"alphabet":"numerical"}"#;
        assert!(serde_json::from_str::<JobRequest>(json).is_err());
    }

    #[test]
    fn validation_errors() {
        let mut r = request();
        r.digest.clear();
        assert_eq!(r.validate(), Err(ValidationError::EmptyDigest));

        let mut r = request();
        r.key_len = 0;
        assert_eq!(r.validate(), Err(ValidationError::KeyLength(0)));

        let mut r = request();
        r.key_len = MAX_KEY_LEN + 1;
        assert!(matches!(r.validate(), Err(ValidationError::KeyLength(_))));

        let mut r = request();
        r.iterations = 0;
        assert_eq!(r.validate(), Err(ValidationError::ZeroIterations));

        let mut r = request();
        r.max_concurrent_tasks = Some(0);
        assert_eq!(r.validate(), Err(ValidationError::ZeroConcurrency));
    }

    #[test]
    fn task_length_travels_as_decimal_string() {
        let assignment = TaskAssignment {
            job_id: 7,
            task_id: 3,
            salt: vec![1, 2],
            digest: vec![3, 4],
            key_len: 20,
            iterations: 1,
            alphabet: Alphabet::AlphaNumMixed,
            algorithm: Algorithm::Pbkdf2Sha256,
            start: Candidate::from("00000000000000000000"),
            task_len: Alphabet::AlphaNumMixed.space_size(20),
            checkpoint: None,
        };
        let value = serde_json::to_value(&assignment).unwrap();
        assert_eq!(
            value["task_len"],
            serde_json::json!("704423425546998022968330264616370176")
        );
        assert!(value.get("checkpoint").is_none());

        let back: TaskAssignment = serde_json::from_value(value).unwrap();
        assert_eq!(back, assignment);
    }

    #[test]
    fn heartbeat_statuses_default_to_empty() {
        let beat: Heartbeat =
            serde_json::from_str(r#"{"address":"10.0.0.1:8081","slots":2}"#).unwrap();
        assert!(beat.statuses.is_empty());
    }

    #[test]
    fn envelope_omits_empty_fields() {
        let ok = serde_json::to_value(ApiResponse::ok(7u64)).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "data": 7}));

        let err: ApiResponse<u64> =
            serde_json::from_str(r#"{"success":false,"error":"job not found"}"#).unwrap();
        assert_eq!(err, ApiResponse::err("job not found"));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::PasswordFound.is_terminal());
        assert!(TaskStatus::PasswordNotFound.is_terminal());
    }
}
