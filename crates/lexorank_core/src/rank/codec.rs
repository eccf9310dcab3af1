//! Rank string <-> digit sequence conversion.

use super::{Digit, Rank, RankError, RankResult};
use crate::config::Alphabet;

/// Maps rank symbols to digits of the alphabet's base and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RankCodec {
    alphabet: Alphabet,
}

impl RankCodec {
    pub fn new(alphabet: Alphabet) -> Self {
        Self { alphabet }
    }

    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    pub fn base(&self) -> Digit {
        self.alphabet.base()
    }

    /// Largest digit, rendered as the alphabet's last symbol.
    pub fn max_digit(&self) -> Digit {
        self.base() - 1
    }

    /// Digit appended when a gap has no room left at current precision.
    pub fn mid_digit(&self) -> Digit {
        self.max_digit() / 2
    }

    /// Parses a rank into most-significant-first digits.
    ///
    /// # Errors
    /// - `InvalidRank` when any symbol is outside the alphabet.
    pub fn parse(&self, rank: &str) -> RankResult<Vec<Digit>> {
        rank.chars()
            .enumerate()
            .map(|(position, symbol)| {
                self.digit_of(symbol).ok_or_else(|| RankError::InvalidRank {
                    rank: rank.to_string(),
                    position,
                    symbol,
                })
            })
            .collect()
    }

    /// Renders digits as a rank string.
    ///
    /// Digits must be below `base()`; arithmetic in this module never
    /// produces anything else.
    pub fn format(&self, digits: &[Digit]) -> String {
        debug_assert!(digits.iter().all(|digit| *digit < self.base()));
        digits
            .iter()
            .map(|digit| char::from(self.alphabet.first_byte() + *digit as u8))
            .collect()
    }

    /// Checks a string against the alphabet and wraps it as a `Rank`.
    pub fn validate(&self, rank: &str) -> RankResult<Rank> {
        self.parse(rank)?;
        Ok(Rank::new(rank))
    }

    fn digit_of(&self, symbol: char) -> Option<Digit> {
        if symbol < self.alphabet.first() || symbol > self.alphabet.last() {
            return None;
        }
        Some(symbol as Digit - self.alphabet.first() as Digit)
    }
}

#[cfg(test)]
mod tests {
    use super::RankCodec;
    use crate::config::Alphabet;
    use crate::rank::RankError;

    #[test]
    fn parse_maps_symbols_to_zero_based_digits() {
        let codec = RankCodec::default();
        assert_eq!(codec.parse("azm").unwrap(), vec![0, 25, 12]);
        assert_eq!(codec.parse("").unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn format_inverts_parse() {
        let codec = RankCodec::default();
        for rank in ["a", "zzzzzz", "bbbbbbm", "hello", "mzzzzz"] {
            assert_eq!(codec.format(&codec.parse(rank).unwrap()), rank);
        }
    }

    #[test]
    fn parse_rejects_symbols_outside_alphabet() {
        let codec = RankCodec::default();
        let err = codec.parse("abC").unwrap_err();
        assert_eq!(
            err,
            RankError::InvalidRank {
                rank: "abC".to_string(),
                position: 2,
                symbol: 'C'
            }
        );
    }

    #[test]
    fn midpoint_of_lowercase_alphabet_is_m() {
        let codec = RankCodec::default();
        assert_eq!(codec.format(&[codec.mid_digit()]), "m");
    }

    #[test]
    fn custom_alphabet_uses_its_own_base() {
        let codec = RankCodec::new(Alphabet::new('0', '9').unwrap());
        assert_eq!(codec.base(), 10);
        assert_eq!(codec.parse("09").unwrap(), vec![0, 9]);
        assert_eq!(codec.format(&[codec.mid_digit()]), "4");
        assert!(codec.parse("0a").is_err());
    }
}
