//! crack-core — shared building blocks for crackgrid.
//!
//! - [`Alphabet`] and the positional codec that maps candidates to
//!   arbitrary-precision combination indices and back
//! - [`partition::split`], which tiles a job's candidate space into tasks
//! - Wire documents exchanged between controller, workers and clients
//! - The pluggable key-derivation seam ([`Hasher`], [`Algorithm`])
//! - Controller and worker configuration

pub mod alphabet;
pub mod codec;
pub mod config;
pub mod hasher;
pub mod partition;
pub mod types;

pub use alphabet::{Alphabet, UnknownAlphabet};
pub use codec::{Candidate, CodecError, CodecResult};
pub use config::{ControllerConfig, FleetConfig, ProvisionerKind, WorkerConfig};
pub use hasher::{Algorithm, Hasher, Pbkdf2Sha256, digest_matches};
pub use partition::{Chunk, PartitionError};
pub use types::*;

/// Current Unix epoch in seconds.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
