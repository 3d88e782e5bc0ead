//! Candidate character sets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const NUMERICAL: &[u8] = b"0123456789";
const ALPHA_LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const ALPHA_MIXED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const ALPHA_NUM_LOWER: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ALPHA_NUM_MIXED: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// An ordered, deduplicated character set.
///
/// The position of a character in the set is its digit value, and the
/// set's size is the base of the positional number system used to index
/// candidates. Every set is stored in ascending ASCII order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alphabet {
    Numerical,
    AlphaLower,
    AlphaMixed,
    AlphaNumLower,
    AlphaNumMixed,
}

impl Alphabet {
    /// All selectable alphabets.
    pub const ALL: [Alphabet; 5] = [
        Alphabet::Numerical,
        Alphabet::AlphaLower,
        Alphabet::AlphaMixed,
        Alphabet::AlphaNumLower,
        Alphabet::AlphaNumMixed,
    ];

    /// The characters of this alphabet, in digit order.
    pub fn chars(&self) -> &'static [u8] {
        match self {
            Alphabet::Numerical => NUMERICAL,
            Alphabet::AlphaLower => ALPHA_LOWER,
            Alphabet::AlphaMixed => ALPHA_MIXED,
            Alphabet::AlphaNumLower => ALPHA_NUM_LOWER,
            Alphabet::AlphaNumMixed => ALPHA_NUM_MIXED,
        }
    }

    /// Base of the number system (alphabet size).
    pub fn base(&self) -> u32 {
        self.chars().len() as u32
    }

    /// Digit value of `byte`, or `None` if it is not in the alphabet.
    pub fn digit_of(&self, byte: u8) -> Option<u8> {
        self.chars().binary_search(&byte).ok().map(|d| d as u8)
    }

    /// Character for a digit value. `digit` must be below [`Self::base`].
    pub fn char_of(&self, digit: u8) -> u8 {
        self.chars()[digit as usize]
    }
}

/// An alphabet name that is not one of [`Alphabet::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown alphabet {0:?}, expected one of numerical, alpha_lower, alpha_mixed, alpha_num_lower, alpha_num_mixed")]
pub struct UnknownAlphabet(pub String);

impl Alphabet {
    /// The snake_case name used on the wire and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Alphabet::Numerical => "numerical",
            Alphabet::AlphaLower => "alpha_lower",
            Alphabet::AlphaMixed => "alpha_mixed",
            Alphabet::AlphaNumLower => "alpha_num_lower",
            Alphabet::AlphaNumMixed => "alpha_num_mixed",
        }
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Alphabet {
    type Err = UnknownAlphabet;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Alphabet::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| UnknownAlphabet(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabets_are_sorted_and_deduplicated() {
        for alphabet in Alphabet::ALL {
            let chars = alphabet.chars();
            assert!(
                chars.windows(2).all(|w| w[0] < w[1]),
                "{alphabet:?} must be strictly ascending"
            );
            assert!(alphabet.base() >= 2);
        }
    }

    #[test]
    fn bases() {
        assert_eq!(Alphabet::Numerical.base(), 10);
        assert_eq!(Alphabet::AlphaLower.base(), 26);
        assert_eq!(Alphabet::AlphaMixed.base(), 52);
        assert_eq!(Alphabet::AlphaNumLower.base(), 36);
        assert_eq!(Alphabet::AlphaNumMixed.base(), 62);
    }

    #[test]
    fn digit_lookup() {
        assert_eq!(Alphabet::AlphaLower.digit_of(b'a'), Some(0));
        assert_eq!(Alphabet::AlphaLower.digit_of(b'z'), Some(25));
        assert_eq!(Alphabet::AlphaLower.digit_of(b'A'), None);
        assert_eq!(Alphabet::AlphaNumLower.digit_of(b'a'), Some(10));
        assert_eq!(Alphabet::AlphaNumLower.char_of(35), b'z');
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Alphabet::AlphaNumLower).unwrap();
        assert_eq!(json, "\"alpha_num_lower\"");
        let parsed: Alphabet = serde_json::from_str("\"numerical\"").unwrap();
        assert_eq!(parsed, Alphabet::Numerical);
    }

    #[test]
    fn names_match_the_wire_form() {
        for alphabet in Alphabet::ALL {
            let wire = serde_json::to_value(alphabet).unwrap();
            assert_eq!(wire, serde_json::json!(alphabet.name()));
            assert_eq!(alphabet.name().parse::<Alphabet>(), Ok(alphabet));
        }
        assert_eq!(
            "hex".parse::<Alphabet>(),
            Err(UnknownAlphabet("hex".to_string()))
        );
    }
}
