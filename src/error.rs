//! Error type for the whole crate.
//!
//! Validation errors are raised at the API boundary and are never observed
//! mid-algorithm; [`Error::TimedOut`] and [`Error::Cancelled`] leave all
//! internal state consistent, and the interrupted computation can be resumed.

use std::fmt;

use crate::word::Letter;

/// Everything that can go wrong when computing with semigroups and
/// congruences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An element violates its degree or arity checks at construction, or an
    /// element of the wrong degree was passed to an engine.
    InvalidElement(String),
    /// A letter outside the alphabet appeared in a word.
    InvalidWord {
        /// The offending letter.
        letter: Letter,
        /// The size of the alphabet the word was validated against.
        alphabet_size: usize,
    },
    /// Mismatched congruence kinds, e.g. when copying or composing.
    IncompatibleTypes(String),
    /// The operation is not defined for the object in its current state,
    /// e.g. requesting the quotient of a one-sided congruence.
    InvalidOperation(String),
    /// An index query beyond the currently known size.
    OutOfRange {
        /// The requested index.
        index: usize,
        /// The number of currently known items.
        size: usize,
    },
    /// An exact cardinality was requested of an obviously infinite object.
    Infinite,
    /// A runner or race hit its deadline without producing a winner.
    TimedOut,
    /// A runner or race was stopped without producing a winner.
    Cancelled,
    /// An index or count exceeded the capacity of the index type.
    Overflow(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidElement(msg) => write!(f, "invalid element: {}", msg),
            Error::InvalidWord {
                letter,
                alphabet_size,
            } => write!(
                f,
                "invalid word: letter {} out of bounds, must be less than {}",
                letter, alphabet_size
            ),
            Error::IncompatibleTypes(msg) => write!(f, "incompatible types: {}", msg),
            Error::InvalidOperation(msg) => write!(f, "invalid operation: {}", msg),
            Error::OutOfRange { index, size } => write!(
                f,
                "index {} out of range, only {} items are known",
                index, size
            ),
            Error::Infinite => write!(f, "the object is obviously infinite"),
            Error::TimedOut => write!(f, "the computation timed out"),
            Error::Cancelled => write!(f, "the computation was stopped"),
            Error::Overflow(what) => write!(f, "overflow in {}", what),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = Error::OutOfRange { index: 9, size: 4 };
        assert_eq!(err.to_string(), "index 9 out of range, only 4 items are known");
        assert_eq!(
            Error::InvalidWord {
                letter: 7,
                alphabet_size: 2
            }
            .to_string(),
            "invalid word: letter 7 out of bounds, must be less than 2"
        );
    }
}
