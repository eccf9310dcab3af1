//! Rank values and base-N rank arithmetic.
//!
//! # Responsibility
//! - Define the `Rank` value and the typed errors of rank computation.
//! - Host the codec, the between/increment arithmetic and the rebalancer.
//!
//! # Invariants
//! - Comparing two ranks as strings matches comparing their digit
//!   sequences numerically, most significant digit first.
//! - A rank is never edited in place; every change mints a new value.
//! - Arithmetic is pure: no I/O, no shared state.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod arithmetic;
pub mod codec;
pub mod rebalance;

pub use arithmetic::RankArithmetic;
pub use codec::RankCodec;
pub use rebalance::RebalanceEngine;

/// One rank digit, `0..base`.
pub type Digit = u32;

/// Result type used by rank computation.
pub type RankResult<T> = Result<T, RankError>;

/// Lexicographically sortable position key.
///
/// Ordering is plain string ordering, so callers may sort or range-filter
/// ranks without going through the arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(String);

impl Rank {
    /// Wraps a stored rank string. Validation happens on first parse.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digit count.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for Rank {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Rank {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Rank> for String {
    fn from(value: Rank) -> Self {
        value.0
    }
}

/// Errors raised by rank computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankError {
    /// Rank contains a symbol outside the configured alphabet.
    InvalidRank {
        rank: String,
        position: usize,
        symbol: char,
    },
    /// `previous` does not sort strictly before `next`.
    OrderViolation { previous: Rank, next: Rank },
    /// Aligned neighbours are longer than the allowed maximum; the scope must
    /// be rebalanced before this placement can be retried.
    RebalancingRequired { length: usize, max_length: usize },
}

impl Display for RankError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRank {
                rank,
                position,
                symbol,
            } => write!(
                f,
                "invalid rank `{rank}`: symbol `{symbol}` at position {position} is outside the alphabet"
            ),
            Self::OrderViolation { previous, next } => write!(
                f,
                "previous rank must sort before next rank: `{previous}` >= `{next}`"
            ),
            Self::RebalancingRequired { length, max_length } => write!(
                f,
                "rebalancing required: aligned rank length {length} exceeds {max_length}"
            ),
        }
    }
}

impl Error for RankError {}
