//! Alphabet codec — candidates as positional numbers.
//!
//! A candidate of length `L` over an alphabet of base `b` is a number in
//! `[0, b^L - 1]`. The wire form of a candidate keeps the most significant
//! digit first, so `"baa"` over `a-z` is 676. For arithmetic the bytes are
//! reversed into little-endian digits: digit 0 is the last wire byte.
//!
//! ```text
//! wire  "b a a"      digits (le)  [0, 0, 1]      index  1·26² = 676
//! ```

use std::fmt;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alphabet::Alphabet;

/// Errors produced when decoding candidates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("byte {byte:#04x} at position {position} is not in the {alphabet:?} alphabet")]
    InvalidCharacter {
        alphabet: Alphabet,
        byte: u8,
        position: usize,
    },
}

pub type CodecResult<T> = Result<T, CodecError>;

/// A fixed-length password guess, in wire (most significant first) order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Candidate(Vec<u8>);

impl Candidate {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The same bytes in reverse order.
    pub fn reversed(&self) -> Candidate {
        Candidate(self.0.iter().rev().copied().collect())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<&str> for Candidate {
    fn from(s: &str) -> Self {
        Candidate(s.as_bytes().to_vec())
    }
}

impl From<String> for Candidate {
    fn from(s: String) -> Self {
        Candidate(s.into_bytes())
    }
}

impl From<Candidate> for String {
    fn from(c: Candidate) -> Self {
        match String::from_utf8(c.0) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl Alphabet {
    /// Combination index of a wire-form candidate.
    pub fn to_index(&self, candidate: &Candidate) -> CodecResult<BigUint> {
        let bytes = candidate.as_bytes();
        let mut digits = Vec::with_capacity(bytes.len());
        for (offset, &byte) in bytes.iter().rev().enumerate() {
            let digit = self.digit_of(byte).ok_or(CodecError::InvalidCharacter {
                alphabet: *self,
                byte,
                position: bytes.len() - 1 - offset,
            })?;
            digits.push(digit);
        }

        if digits.is_empty() {
            return Ok(BigUint::zero());
        }
        // Every digit is below the base, so this cannot fail.
        Ok(BigUint::from_radix_le(&digits, self.base()).unwrap_or_default())
    }

    /// Candidate of `length` digits for `index`.
    ///
    /// The boolean is `true` when `index` does not fit in `length` digits,
    /// meaning the space is exhausted. The returned candidate then holds
    /// only the low `length` digits and must not be used as a guess.
    pub fn from_index(&self, index: &BigUint, length: usize) -> (Candidate, bool) {
        let mut digits = if index.is_zero() {
            Vec::new()
        } else {
            index.to_radix_le(self.base())
        };

        let overflow = digits.len() > length;
        digits.resize(length, 0);

        let bytes = digits.iter().rev().map(|&d| self.char_of(d)).collect();
        (Candidate(bytes), overflow)
    }

    /// The all-minimum candidate (`aaa…a`).
    pub fn initial_candidate(&self, length: usize) -> Candidate {
        Candidate(vec![self.char_of(0); length])
    }

    /// The all-maximum candidate (`zzz…z`).
    pub fn final_candidate(&self, length: usize) -> Candidate {
        Candidate(vec![self.char_of((self.base() - 1) as u8); length])
    }

    /// Number of candidates of `length` digits: `base^length`.
    pub fn space_size(&self, length: usize) -> BigUint {
        let mut size = BigUint::one();
        let base = BigUint::from(self.base());
        for _ in 0..length {
            size *= &base;
        }
        size
    }

    /// Whether every byte of `candidate` belongs to this alphabet.
    pub fn contains(&self, candidate: &Candidate) -> bool {
        candidate.as_bytes().iter().all(|&b| self.digit_of(b).is_some())
    }
}
