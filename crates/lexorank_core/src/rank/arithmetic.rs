//! Base-N rank arithmetic.
//!
//! # Responsibility
//! - Compute a rank strictly between two neighbours, or at an open end.
//! - Decide minted rank length from collection size.
//! - Produce the even step and increments used by rebalancing.
//!
//! # Invariants
//! - All arithmetic runs on most-significant-first digit vectors; numbers
//!   are never narrowed to machine integers, so 200-digit ranks are exact.
//! - Halving rounds toward `previous`.
//! - Padding never inverts the order of the two neighbours: `previous` and
//!   any stored `next` are extended with the lowest digit, the open upper
//!   bound with the highest digit.

use super::codec::RankCodec;
use super::{Digit, Rank, RankError, RankResult};
use crate::config::RankConfig;
use std::mem;

/// Rank arithmetic bound to one alphabet and one maximum length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankArithmetic {
    codec: RankCodec,
    max_rank_length: usize,
}

impl RankArithmetic {
    pub fn new(config: &RankConfig) -> Self {
        Self {
            codec: RankCodec::new(config.alphabet),
            max_rank_length: config.max_rank_length,
        }
    }

    pub fn codec(&self) -> RankCodec {
        self.codec
    }

    pub fn max_rank_length(&self) -> usize {
        self.max_rank_length
    }

    /// Digit count for ranks minted in a collection of `collection_size`.
    ///
    /// Twice the digits needed to enumerate the collection, never below
    /// `default_length`, never above the maximum rank length.
    pub fn rank_length(&self, collection_size: u64, default_length: usize) -> usize {
        let required = if collection_size == 0 {
            1
        } else {
            ceil_log(collection_size, self.codec.base())
        };
        (required * 2)
            .max(default_length)
            .min(self.max_rank_length)
    }

    /// All-lowest-digit rank of `rank_length` digits.
    pub fn min_rank(&self, collection_size: u64, default_length: usize) -> Rank {
        let length = self.rank_length(collection_size, default_length);
        Rank::new(self.codec.format(&vec![0; length]))
    }

    /// All-highest-digit rank of `rank_length` digits.
    pub fn max_rank(&self, collection_size: u64, default_length: usize) -> Rank {
        let length = self.rank_length(collection_size, default_length);
        Rank::new(self.codec.format(&vec![self.codec.max_digit(); length]))
    }

    /// Even spacing `floor(base^rank_length / collection_size - 0.5)`.
    ///
    /// Returned as most-significant-first digits without leading zeros.
    /// An empty collection is spaced like a single item.
    pub fn rank_step(&self, collection_size: u64, default_length: usize) -> Vec<Digit> {
        let length = self.rank_length(collection_size, default_length);
        let base = self.codec.base();
        let divisor = u128::from(collection_size.max(1));

        let mut quotient = Vec::with_capacity(length + 1);
        let mut remainder: u128 = 0;
        // base^length is a one followed by `length` zeros.
        for digit in std::iter::once::<Digit>(1).chain(std::iter::repeat(0).take(length)) {
            let current = remainder * u128::from(base) + u128::from(digit);
            quotient.push((current / divisor) as Digit);
            remainder = current % divisor;
        }

        if remainder * 2 < divisor {
            decrement_digits(&mut quotient, base);
        }
        trim_leading_zeros(quotient)
    }

    /// Adds one `rank_step` to `rank`, growing it on overflow.
    pub fn increment(
        &self,
        rank: &Rank,
        collection_size: u64,
        default_length: usize,
    ) -> RankResult<Rank> {
        let digits = self.codec.parse(rank.as_str())?;
        let step = self.rank_step(collection_size, default_length);
        let sum = add_digits(&digits, &step, self.codec.base());
        Ok(Rank::new(self.codec.format(&sum)))
    }

    /// Computes a rank strictly between `previous` and `next`.
    ///
    /// An absent `previous` stands for the minimum rank and an absent `next`
    /// for the maximum rank of `rank_length(collection_size, default_length)`.
    /// A `previous` made only of the highest digit is extended by one digit
    /// against an absent `next`, so appending at the bottom always succeeds.
    ///
    /// # Errors
    /// - `InvalidRank` when a neighbour has symbols outside the alphabet.
    /// - `RebalancingRequired` when the aligned length exceeds the maximum.
    /// - `OrderViolation` when the aligned neighbours are equal, or when
    ///   `previous > next` and `allow_unordered` is false.
    pub fn between(
        &self,
        previous: Option<&Rank>,
        next: Option<&Rank>,
        collection_size: u64,
        default_length: usize,
        allow_unordered: bool,
    ) -> RankResult<Rank> {
        let fresh_length = self.rank_length(collection_size, default_length);
        let base = self.codec.base();
        let top = self.codec.max_digit();

        let lower = match previous {
            Some(rank) => Bound::stored(self.codec.parse(rank.as_str())?),
            None => Bound::stored(vec![0; fresh_length]),
        };
        let upper = match next {
            Some(rank) => Bound::stored(self.codec.parse(rank.as_str())?),
            None => Bound::open(vec![top; fresh_length], top),
        };

        let mut width = lower.digits.len().max(upper.digits.len());
        // An all-highest `previous` at full width leaves no room below the
        // open upper bound; one more digit does.
        let saturated =
            lower.digits.len() == width && lower.digits.iter().all(|digit| *digit == top);
        if next.is_none() && saturated {
            width += 1;
        }
        if width > self.max_rank_length {
            return Err(RankError::RebalancingRequired {
                length: width,
                max_length: self.max_rank_length,
            });
        }

        let mut lower = lower.aligned(width);
        let mut upper = upper.aligned(width);
        if allow_unordered && lower > upper {
            mem::swap(&mut lower, &mut upper);
        }
        if lower >= upper {
            return Err(RankError::OrderViolation {
                previous: Rank::new(self.codec.format(&lower)),
                next: Rank::new(self.codec.format(&upper)),
            });
        }

        let gap = subtract_digits(&upper, &lower, base);
        let half = halve_digits(&gap, base);
        let mut middle = add_digits(&lower, &half, base);
        if middle == lower {
            // Odd single-unit gap: one more digit recovers room.
            middle.push(self.codec.mid_digit());
        }
        Ok(Rank::new(self.codec.format(&middle)))
    }
}

struct Bound {
    digits: Vec<Digit>,
    pad: Digit,
}

impl Bound {
    fn stored(digits: Vec<Digit>) -> Self {
        Self { digits, pad: 0 }
    }

    fn open(digits: Vec<Digit>, pad: Digit) -> Self {
        Self { digits, pad }
    }

    fn aligned(mut self, width: usize) -> Vec<Digit> {
        self.digits.resize(width, self.pad);
        self.digits
    }
}

/// Smallest `exponent` with `base^exponent >= value`.
fn ceil_log(value: u64, base: Digit) -> usize {
    let target = u128::from(value);
    let base = u128::from(base);
    let mut power: u128 = 1;
    let mut exponent = 0;
    while power < target {
        power *= base;
        exponent += 1;
    }
    exponent
}

fn digit_from_right(digits: &[Digit], offset: usize) -> Digit {
    if offset <= digits.len() {
        digits[digits.len() - offset]
    } else {
        0
    }
}

/// Right-aligned addition; the result grows by one digit on final carry.
fn add_digits(lhs: &[Digit], rhs: &[Digit], base: Digit) -> Vec<Digit> {
    let width = lhs.len().max(rhs.len());
    let mut result = Vec::with_capacity(width + 1);
    let mut carry = 0;
    for offset in 1..=width {
        let total = digit_from_right(lhs, offset) + digit_from_right(rhs, offset) + carry;
        result.push(total % base);
        carry = total / base;
    }
    if carry > 0 {
        result.push(carry);
    }
    result.reverse();
    result
}

/// `minuend - subtrahend` for equal-length inputs with `minuend >= subtrahend`.
fn subtract_digits(minuend: &[Digit], subtrahend: &[Digit], base: Digit) -> Vec<Digit> {
    let mut result = vec![0; minuend.len()];
    let mut borrow = 0;
    for index in (0..minuend.len()).rev() {
        let take = subtrahend[index] + borrow;
        if minuend[index] >= take {
            result[index] = minuend[index] - take;
            borrow = 0;
        } else {
            result[index] = minuend[index] + base - take;
            borrow = 1;
        }
    }
    result
}

/// Floor division by two, keeping the input width.
fn halve_digits(digits: &[Digit], base: Digit) -> Vec<Digit> {
    let mut remainder = 0;
    digits
        .iter()
        .map(|digit| {
            let current = remainder * base + digit;
            remainder = current % 2;
            current / 2
        })
        .collect()
}

/// Subtracts one in place; zero stays zero.
fn decrement_digits(digits: &mut [Digit], base: Digit) {
    if digits.iter().all(|digit| *digit == 0) {
        return;
    }
    for digit in digits.iter_mut().rev() {
        if *digit > 0 {
            *digit -= 1;
            return;
        }
        *digit = base - 1;
    }
}

fn trim_leading_zeros(digits: Vec<Digit>) -> Vec<Digit> {
    let first_significant = digits
        .iter()
        .position(|digit| *digit != 0)
        .unwrap_or(digits.len().saturating_sub(1));
    digits[first_significant..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::{add_digits, ceil_log, halve_digits, subtract_digits, RankArithmetic};
    use crate::config::RankConfig;
    use crate::rank::{Rank, RankError};

    fn arithmetic() -> RankArithmetic {
        RankArithmetic::new(&RankConfig::default())
    }

    fn rank(value: &str) -> Rank {
        Rank::new(value)
    }

    #[test]
    fn ceil_log_matches_powers_of_base() {
        assert_eq!(ceil_log(1, 26), 0);
        assert_eq!(ceil_log(26, 26), 1);
        assert_eq!(ceil_log(27, 26), 2);
        assert_eq!(ceil_log(676, 26), 2);
        assert_eq!(ceil_log(677, 26), 3);
        assert_eq!(ceil_log(u64::MAX, 26), 14);
    }

    #[test]
    fn digit_helpers_carry_and_borrow() {
        assert_eq!(add_digits(&[25, 25], &[1], 26), vec![1, 0, 0]);
        assert_eq!(subtract_digits(&[2, 0], &[1, 12], 26), vec![0, 14]);
        assert_eq!(halve_digits(&[1, 1], 26), vec![0, 13]);
    }

    #[test]
    fn rank_length_is_floored_and_grows_with_collection() {
        let arithmetic = arithmetic();
        assert_eq!(arithmetic.rank_length(0, 6), 6);
        assert_eq!(arithmetic.rank_length(1, 6), 6);
        assert_eq!(arithmetic.rank_length(17_576, 6), 6);
        assert_eq!(arithmetic.rank_length(17_577, 6), 8);
        assert_eq!(arithmetic.rank_length(0, 1), 2);
        assert_eq!(arithmetic.rank_length(u64::MAX, 6), 28);
    }

    #[test]
    fn rank_length_is_capped_at_max() {
        let arithmetic = RankArithmetic::new(&RankConfig {
            max_rank_length: 4,
            default_rank_length: 4,
            ..RankConfig::default()
        });
        assert_eq!(arithmetic.rank_length(u64::MAX, 4), 4);
    }

    #[test]
    fn rank_step_spaces_the_key_space_evenly() {
        let arithmetic = arithmetic();
        assert_eq!(arithmetic.rank_step(1, 6), vec![25; 6]);
        assert_eq!(arithmetic.rank_step(0, 6), vec![25; 6]);
        assert_eq!(arithmetic.rank_step(2, 6), vec![12, 25, 25, 25, 25, 25]);
    }

    #[test]
    fn increment_adds_step_and_prepends_on_overflow() {
        let arithmetic = arithmetic();
        assert_eq!(
            arithmetic.increment(&rank("aaaaaa"), 1, 6).unwrap(),
            rank("zzzzzz")
        );
        assert_eq!(
            arithmetic.increment(&rank("mzzzzz"), 2, 6).unwrap(),
            rank("zzzzzy")
        );
        assert_eq!(
            arithmetic.increment(&rank("zzzzzz"), 1, 6).unwrap(),
            rank("bzzzzzy")
        );
    }

    #[test]
    fn between_adjacent_ranks_appends_midpoint_digit() {
        let result = arithmetic()
            .between(Some(&rank("bbbbbb")), Some(&rank("bbbbbc")), 10, 6, false)
            .unwrap();
        assert_eq!(result, rank("bbbbbbm"));
    }

    #[test]
    fn between_empty_bounds_returns_key_space_midpoint() {
        let result = arithmetic().between(None, None, 0, 6, false).unwrap();
        assert_eq!(result, rank("mzzzzz"));
    }

    #[test]
    fn between_rounds_toward_previous() {
        let arithmetic = arithmetic();
        assert_eq!(
            arithmetic
                .between(Some(&rank("a")), Some(&rank("c")), 0, 1, false)
                .unwrap(),
            rank("b")
        );
        assert_eq!(
            arithmetic
                .between(Some(&rank("a")), Some(&rank("d")), 0, 1, false)
                .unwrap(),
            rank("b")
        );
    }

    #[test]
    fn between_keeps_result_below_shorter_next() {
        let result = arithmetic()
            .between(Some(&rank("bbbbbbm")), Some(&rank("bbbbbc")), 10, 6, false)
            .unwrap();
        assert_eq!(result, rank("bbbbbbt"));
        assert!(result > rank("bbbbbbm"));
        assert!(result < rank("bbbbbc"));
    }

    #[test]
    fn between_rejects_unordered_neighbours_unless_allowed() {
        let arithmetic = arithmetic();
        let err = arithmetic
            .between(Some(&rank("c")), Some(&rank("b")), 0, 1, false)
            .unwrap_err();
        assert!(matches!(err, RankError::OrderViolation { .. }));

        let result = arithmetic
            .between(Some(&rank("c")), Some(&rank("b")), 0, 1, true)
            .unwrap();
        assert_eq!(result, rank("bm"));
    }

    #[test]
    fn between_open_upper_bound_widens_past_highest_rank() {
        let arithmetic = arithmetic();
        let top = rank("zzzzzz");

        let result = arithmetic.between(Some(&top), None, 1, 6, false).unwrap();
        assert_eq!(result, rank("zzzzzzm"));
        assert!(result > top);

        let longer = arithmetic
            .between(Some(&rank("zzzzzzzz")), None, 1, 6, false)
            .unwrap();
        assert_eq!(longer, rank("zzzzzzzzm"));
    }

    #[test]
    fn between_open_upper_bound_respects_max_length_when_widening() {
        let arithmetic = arithmetic();
        let full = rank(&"z".repeat(200));
        let err = arithmetic.between(Some(&full), None, 1, 6, false).unwrap_err();
        assert_eq!(
            err,
            RankError::RebalancingRequired {
                length: 201,
                max_length: 200
            }
        );
    }

    #[test]
    fn between_rejects_equal_neighbours_even_when_unordered_is_allowed() {
        let err = arithmetic()
            .between(Some(&rank("abc")), Some(&rank("abc")), 0, 3, true)
            .unwrap_err();
        assert!(matches!(err, RankError::OrderViolation { .. }));
    }

    #[test]
    fn between_requires_rebalancing_past_max_length() {
        let arithmetic = arithmetic();
        let long = rank(&"b".repeat(201));
        let err = arithmetic.between(Some(&long), None, 5, 6, false).unwrap_err();
        assert_eq!(
            err,
            RankError::RebalancingRequired {
                length: 201,
                max_length: 200
            }
        );

        let at_limit = rank(&"b".repeat(200));
        assert!(arithmetic.between(Some(&at_limit), None, 5, 6, false).is_ok());
    }

    #[test]
    fn between_rejects_invalid_symbols() {
        let err = arithmetic()
            .between(Some(&rank("ab1")), None, 0, 6, false)
            .unwrap_err();
        assert!(matches!(err, RankError::InvalidRank { position: 2, .. }));
    }
}
