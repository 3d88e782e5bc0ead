//! Candidate enumerator — lazily walks one task's slice of the space.
//!
//! The enumerator counts in wire form (most significant digit first) and
//! hands out the reversed bytes as the password guess. Its checkpoint is
//! the wire form of the next candidate it would produce, so resuming from
//! a checkpoint neither skips nor repeats a guess.

use num_bigint::BigUint;
use num_traits::Zero;

use crack_core::{Alphabet, Candidate, TaskAssignment};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumeratorState {
    Active,
    Exhausted,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CandidateEnumerator {
    alphabet: Alphabet,
    length: usize,
    /// Index of the next candidate.
    index: BigUint,
    /// Candidates left, including the one at `index`.
    remaining: BigUint,
    state: EnumeratorState,
}

impl CandidateEnumerator {
    /// Enumerate `len` candidates from `start`.
    pub fn new(alphabet: Alphabet, start: &Candidate, len: BigUint) -> Result<Self, EngineError> {
        let index = alphabet.to_index(start)?;
        let state = if len.is_zero() {
            EnumeratorState::Exhausted
        } else {
            EnumeratorState::Active
        };
        Ok(Self {
            alphabet,
            length: start.len(),
            index,
            remaining: len,
            state,
        })
    }

    /// Pick a task up again at `checkpoint`.
    ///
    /// The checkpoint must lie in `[start, start + len]`; the upper bound
    /// itself means everything was already checked.
    pub fn resume(
        alphabet: Alphabet,
        start: &Candidate,
        len: BigUint,
        checkpoint: &Candidate,
    ) -> Result<Self, EngineError> {
        if checkpoint.len() != start.len() {
            return Err(EngineError::LengthMismatch {
                candidate: checkpoint.clone(),
                expected: start.len(),
                got: checkpoint.len(),
            });
        }

        let mut enumerator = Self::new(alphabet, start, len)?;
        let checkpoint_index = alphabet.to_index(checkpoint)?;
        let out_of_range = || EngineError::ResumeOutOfRange {
            start: start.clone(),
            checkpoint: checkpoint.clone(),
        };
        if checkpoint_index < enumerator.index {
            return Err(out_of_range());
        }
        let consumed = &checkpoint_index - &enumerator.index;
        if consumed > enumerator.remaining {
            return Err(out_of_range());
        }

        enumerator.remaining -= consumed;
        enumerator.index = checkpoint_index;
        if enumerator.remaining.is_zero() {
            enumerator.state = EnumeratorState::Exhausted;
        }
        Ok(enumerator)
    }

    /// Enumerator for an assignment, resuming from its checkpoint if any.
    pub fn for_assignment(assignment: &TaskAssignment) -> Result<Self, EngineError> {
        if assignment.start.len() != assignment.key_len {
            return Err(EngineError::LengthMismatch {
                candidate: assignment.start.clone(),
                expected: assignment.key_len,
                got: assignment.start.len(),
            });
        }
        match &assignment.checkpoint {
            Some(checkpoint) => Self::resume(
                assignment.alphabet,
                &assignment.start,
                assignment.task_len.clone(),
                checkpoint,
            ),
            None => Self::new(
                assignment.alphabet,
                &assignment.start,
                assignment.task_len.clone(),
            ),
        }
    }

    pub fn state(&self) -> EnumeratorState {
        self.state
    }

    pub fn remaining(&self) -> &BigUint {
        &self.remaining
    }

    /// Wire form of the next candidate, or `None` once nothing is left.
    pub fn checkpoint(&self) -> Option<Candidate> {
        if self.state != EnumeratorState::Active {
            return None;
        }
        match self.alphabet.from_index(&self.index, self.length) {
            (candidate, false) => Some(candidate),
            (_, true) => None,
        }
    }

    /// Stop producing candidates.
    pub fn cancel(&mut self) {
        if self.state == EnumeratorState::Active {
            self.state = EnumeratorState::Cancelled;
        }
    }
}

impl Iterator for CandidateEnumerator {
    type Item = Candidate;

    /// The next password guess.
    fn next(&mut self) -> Option<Candidate> {
        if self.state != EnumeratorState::Active {
            return None;
        }
        if self.remaining.is_zero() {
            self.state = EnumeratorState::Exhausted;
            return None;
        }
        let (wire, overflow) = self.alphabet.from_index(&self.index, self.length);
        if overflow {
            self.state = EnumeratorState::Exhausted;
            return None;
        }

        self.index += 1u32;
        self.remaining -= 1u32;
        Some(wire.reversed())
    }
}
