//! Key-derivation seam.
//!
//! Workers hash every candidate with the job's algorithm and compare the
//! result to the target digest. New algorithms plug in as another
//! [`Algorithm`] variant with its own [`Hasher`].

use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Key-derivation function selected by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    Pbkdf2Sha256,
}

impl Algorithm {
    /// The hasher implementing this algorithm.
    pub fn hasher(&self) -> Box<dyn Hasher> {
        match self {
            Algorithm::Pbkdf2Sha256 => Box::new(Pbkdf2Sha256),
        }
    }
}

/// Derives a digest of `out_len` bytes from one candidate.
pub trait Hasher: Send + Sync {
    fn hash(&self, candidate: &[u8], salt: &[u8], iterations: u32, out_len: usize) -> Vec<u8>;
}

/// PBKDF2 with HMAC-SHA256.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pbkdf2Sha256;

impl Hasher for Pbkdf2Sha256 {
    fn hash(&self, candidate: &[u8], salt: &[u8], iterations: u32, out_len: usize) -> Vec<u8> {
        let mut out = vec![0u8; out_len];
        pbkdf2::pbkdf2_hmac::<Sha256>(candidate, salt, iterations, &mut out);
        out
    }
}

/// Constant-time digest comparison.
pub fn digest_matches(computed: &[u8], target: &[u8]) -> bool {
    computed.ct_eq(target).into()
}
