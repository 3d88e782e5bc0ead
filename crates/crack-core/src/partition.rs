//! Job partitioning — tiles a candidate space into bounded tasks.
//!
//! ```text
//! initial                                                     final
//!   |---- chunk ----|---- chunk ----|---- chunk ----|-- rest --|
//!   start₀          start₁          start₂          start₃
//! ```

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use thiserror::Error;
use tracing::debug;

use crate::alphabet::Alphabet;
use crate::codec::Candidate;

/// Upper bound on the number of tasks one job may be split into.
pub const MAX_TASKS_PER_JOB: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("chunk size must be at least one candidate")]
    ZeroChunk,

    #[error("candidate length must be at least one")]
    ZeroLength,

    #[error("iteration count {iterations} exceeds the task budget of {budget} hashes")]
    BudgetTooSmall { budget: u64, iterations: u32 },

    #[error("job would need {tasks} tasks, the limit is {limit}", limit = MAX_TASKS_PER_JOB)]
    TooManyTasks { tasks: String },
}

/// One task's worth of candidate space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// First candidate of the chunk, in wire form.
    pub start: Candidate,
    /// Number of candidates in the chunk.
    pub len: BigUint,
}

/// Candidates per task for a job with the given iteration count.
///
/// `budget` is the number of raw hash iterations a task should take, so a
/// job that costs more per candidate gets fewer candidates per task.
pub fn chunk_size_for(budget: u64, iterations: u32) -> Result<u64, PartitionError> {
    if iterations == 0 || budget < u64::from(iterations) {
        return Err(PartitionError::BudgetTooSmall { budget, iterations });
    }
    Ok(budget / u64::from(iterations))
}

/// Number of tasks `split` would produce, without materializing them.
pub fn task_count(alphabet: Alphabet, length: usize, chunk_size: &BigUint) -> BigUint {
    if chunk_size.is_zero() {
        return BigUint::zero();
    }
    let space = alphabet.space_size(length);
    (&space + chunk_size - 1u32) / chunk_size
}

/// Refuse partitions that would create more than [`MAX_TASKS_PER_JOB`] tasks.
pub fn check_task_count(
    alphabet: Alphabet,
    length: usize,
    chunk_size: &BigUint,
) -> Result<u64, PartitionError> {
    let count = task_count(alphabet, length, chunk_size);
    match count.to_u64() {
        Some(n) if n <= MAX_TASKS_PER_JOB => Ok(n),
        _ => Err(PartitionError::TooManyTasks {
            tasks: count.to_string(),
        }),
    }
}

/// Split the space of `length`-character candidates into chunks of
/// `chunk_size`.
///
/// The chunks are ordered, contiguous and cover `[initial, final]`
/// exactly. Every chunk but the last has `chunk_size` candidates; the last
/// one is clipped to what remains.
pub fn split(
    alphabet: Alphabet,
    length: usize,
    chunk_size: &BigUint,
) -> Result<Vec<Chunk>, PartitionError> {
    if chunk_size.is_zero() {
        return Err(PartitionError::ZeroChunk);
    }
    if length == 0 {
        return Err(PartitionError::ZeroLength);
    }

    let final_index = alphabet
        .to_index(&alphabet.final_candidate(length))
        .unwrap_or_default();

    let mut chunks = Vec::new();
    let mut current = alphabet.initial_candidate(length);
    let mut current_index = BigUint::zero();

    loop {
        let next_index = &current_index + chunk_size;
        let (next, overflow) = alphabet.from_index(&next_index, length);
        if overflow {
            let len = &final_index - &current_index + 1u32;
            chunks.push(Chunk {
                start: current,
                len,
            });
            break;
        }
        chunks.push(Chunk {
            start: current,
            len: chunk_size.clone(),
        });
        current = next;
        current_index = next_index;
    }

    debug!(?alphabet, length, %chunk_size, chunks = chunks.len(), "candidate space split");
    Ok(chunks)
}
