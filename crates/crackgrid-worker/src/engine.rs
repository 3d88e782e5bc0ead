//! Crack engine — hashes one task's candidates on a dedicated thread.
//!
//! The engine owns its enumerator. Other parts of the worker talk to it
//! only through its request channel, which it drains without blocking
//! before every hash, so a request waits at most one hash.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crack_core::{Candidate, Hasher, TaskAssignment, digest_matches};

use crate::enumerator::CandidateEnumerator;
use crate::error::EngineError;

/// Capacity of an engine's request channel.
pub const REQUEST_BUFFER: usize = 8;

/// Messages into a running engine.
#[derive(Debug)]
pub enum EngineRequest {
    /// Reply with the wire form of the next unchecked candidate.
    Progress(oneshot::Sender<Option<Candidate>>),
    /// Stop without a result.
    Kill,
}

/// How a task run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Found(String),
    NotFound,
    /// Stopped by a kill request; the result belongs to someone else.
    Killed,
}

pub struct CrackEngine {
    enumerator: CandidateEnumerator,
    hasher: Box<dyn Hasher>,
    salt: Vec<u8>,
    digest: Vec<u8>,
    iterations: u32,
    requests: mpsc::Receiver<EngineRequest>,
}

impl CrackEngine {
    pub fn new(
        assignment: &TaskAssignment,
        requests: mpsc::Receiver<EngineRequest>,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            enumerator: CandidateEnumerator::for_assignment(assignment)?,
            hasher: assignment.algorithm.hasher(),
            salt: assignment.salt.clone(),
            digest: assignment.digest.clone(),
            iterations: assignment.iterations,
            requests,
        })
    }

    /// Run to completion. Blocks the calling thread.
    pub fn run(mut self) -> Outcome {
        loop {
            if !self.serve_requests() {
                self.enumerator.cancel();
                return Outcome::Killed;
            }

            let Some(guess) = self.enumerator.next() else {
                return Outcome::NotFound;
            };
            let computed = self.hasher.hash(
                guess.as_bytes(),
                &self.salt,
                self.iterations,
                self.digest.len(),
            );
            if digest_matches(&computed, &self.digest) {
                return Outcome::Found(guess.into());
            }
        }
    }

    /// Answer everything queued. Returns `false` when the engine must stop.
    fn serve_requests(&mut self) -> bool {
        loop {
            match self.requests.try_recv() {
                Ok(EngineRequest::Progress(reply)) => {
                    let _ = reply.send(self.enumerator.checkpoint());
                }
                Ok(EngineRequest::Kill) => return false,
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    debug!("engine owner went away, stopping");
                    return false;
                }
            }
        }
    }
}
