//! Explicit rank and list configuration values.
//!
//! # Responsibility
//! - Describe the rank alphabet, length policy and rebalancing threshold.
//! - Describe one ordered list: its name, scoping and insert policy.
//!
//! # Invariants
//! - Configuration is passed by value into arithmetic and list services;
//!   there is no process-wide mutable default.
//! - An `Alphabet` is a contiguous ASCII range with at least two symbols.
//! - List names match `^[a-z][a-z0-9_]*$`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Digit count of freshly minted ranks for small lists.
pub const DEFAULT_RANK_LENGTH: usize = 6;
/// Rank length at which a scope is flagged for rebalancing.
pub const DEFAULT_REBALANCING_LENGTH: usize = 128;
/// Hard ceiling on aligned rank length before placement is refused.
pub const DEFAULT_MAX_RANK_LENGTH: usize = 200;

static LIST_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid list name regex"));

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Alphabet bounds are not a usable ASCII range.
    InvalidAlphabet { first: char, last: char },
    /// `default_rank_length` is zero.
    ZeroDefaultLength,
    /// `rebalancing_length` is zero.
    ZeroRebalancingLength,
    /// `default_rank_length` exceeds `max_rank_length`.
    DefaultLengthExceedsMax { default_length: usize, max_length: usize },
    /// List name does not match the accepted pattern.
    InvalidListName(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAlphabet { first, last } => write!(
                f,
                "alphabet `{first}`..=`{last}` must be an ascending printable ASCII range"
            ),
            Self::ZeroDefaultLength => write!(f, "default_rank_length must be at least 1"),
            Self::ZeroRebalancingLength => write!(f, "rebalancing_length must be at least 1"),
            Self::DefaultLengthExceedsMax {
                default_length,
                max_length,
            } => write!(
                f,
                "default_rank_length {default_length} exceeds max_rank_length {max_length}"
            ),
            Self::InvalidListName(name) => write!(
                f,
                "list name `{name}` must match ^[a-z][a-z0-9_]*$"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Contiguous symbol range used to render rank digits.
///
/// Digit `0` renders as `first`, digit `base - 1` renders as `last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AlphabetBounds", into = "AlphabetBounds")]
pub struct Alphabet {
    first: u8,
    last: u8,
}

#[derive(Serialize, Deserialize)]
struct AlphabetBounds {
    first: char,
    last: char,
}

impl Alphabet {
    /// Lowercase latin alphabet, `a..=z`.
    pub const LOWERCASE: Alphabet = Alphabet {
        first: b'a',
        last: b'z',
    };

    /// Builds an alphabet from inclusive bounds.
    ///
    /// # Errors
    /// - `InvalidAlphabet` when either bound is not printable ASCII or the
    ///   range holds fewer than two symbols.
    pub fn new(first: char, last: char) -> Result<Self, ConfigError> {
        let printable = first.is_ascii_graphic() && last.is_ascii_graphic();
        if !printable || first >= last {
            return Err(ConfigError::InvalidAlphabet { first, last });
        }
        Ok(Self {
            first: first as u8,
            last: last as u8,
        })
    }

    pub fn first(&self) -> char {
        char::from(self.first)
    }

    pub fn last(&self) -> char {
        char::from(self.last)
    }

    /// Number of symbols, i.e. the numeric base of rank digits.
    pub fn base(&self) -> u32 {
        u32::from(self.last - self.first) + 1
    }

    pub(crate) fn first_byte(&self) -> u8 {
        self.first
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::LOWERCASE
    }
}

impl TryFrom<AlphabetBounds> for Alphabet {
    type Error = ConfigError;

    fn try_from(value: AlphabetBounds) -> Result<Self, Self::Error> {
        Self::new(value.first, value.last)
    }
}

impl From<Alphabet> for AlphabetBounds {
    fn from(value: Alphabet) -> Self {
        Self {
            first: value.first(),
            last: value.last(),
        }
    }
}

/// Rank arithmetic and growth policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankConfig {
    pub alphabet: Alphabet,
    /// Minimum digit count of minted ranks.
    pub default_rank_length: usize,
    /// A scope holding a rank at least this long needs rebalancing.
    pub rebalancing_length: usize,
    /// Aligned rank length beyond which placement fails.
    pub max_rank_length: usize,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            alphabet: Alphabet::default(),
            default_rank_length: DEFAULT_RANK_LENGTH,
            rebalancing_length: DEFAULT_REBALANCING_LENGTH,
            max_rank_length: DEFAULT_MAX_RANK_LENGTH,
        }
    }
}

impl RankConfig {
    /// Validates length policy.
    ///
    /// `rebalancing_length` may exceed `max_rank_length`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_rank_length == 0 {
            return Err(ConfigError::ZeroDefaultLength);
        }
        if self.rebalancing_length == 0 {
            return Err(ConfigError::ZeroRebalancingLength);
        }
        if self.default_rank_length > self.max_rank_length {
            return Err(ConfigError::DefaultLengthExceedsMax {
                default_length: self.default_rank_length,
                max_length: self.max_rank_length,
            });
        }
        Ok(())
    }
}

/// Configuration of one ordered list (one entity type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListConfig {
    /// Stable list identifier, persisted next to every item and marker.
    pub name: String,
    /// Whether every call must carry a scope key.
    #[serde(default)]
    pub scoped: bool,
    /// New items and scope changes land at the bottom instead of the top.
    #[serde(default)]
    pub insert_to_bottom: bool,
    #[serde(default)]
    pub rank: RankConfig,
}

impl ListConfig {
    /// Unscoped list with top insertion and default rank policy.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scoped: false,
            insert_to_bottom: false,
            rank: RankConfig::default(),
        }
    }

    /// Requires a scope key on every call.
    pub fn scoped(mut self) -> Self {
        self.scoped = true;
        self
    }

    pub fn insert_to_bottom(mut self) -> Self {
        self.insert_to_bottom = true;
        self
    }

    pub fn with_rank(mut self, rank: RankConfig) -> Self {
        self.rank = rank;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LIST_NAME_RE.is_match(&self.name) {
            return Err(ConfigError::InvalidListName(self.name.clone()));
        }
        self.rank.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::{Alphabet, ConfigError, ListConfig, RankConfig};

    #[test]
    fn default_alphabet_is_lowercase_base_26() {
        let alphabet = Alphabet::default();
        assert_eq!(alphabet.first(), 'a');
        assert_eq!(alphabet.last(), 'z');
        assert_eq!(alphabet.base(), 26);
    }

    #[test]
    fn alphabet_rejects_reversed_and_non_ascii_bounds() {
        assert!(matches!(
            Alphabet::new('z', 'a'),
            Err(ConfigError::InvalidAlphabet { .. })
        ));
        assert!(matches!(
            Alphabet::new('a', 'é'),
            Err(ConfigError::InvalidAlphabet { .. })
        ));
        assert!(Alphabet::new('0', '9').is_ok());
    }

    #[test]
    fn rank_config_rejects_default_longer_than_max() {
        let config = RankConfig {
            default_rank_length: 10,
            max_rank_length: 8,
            ..RankConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::DefaultLengthExceedsMax {
                default_length: 10,
                max_length: 8
            })
        );
    }

    #[test]
    fn list_name_must_match_pattern() {
        assert!(ListConfig::new("tasks_v2").validate().is_ok());
        assert!(matches!(
            ListConfig::new("Tasks").validate(),
            Err(ConfigError::InvalidListName(_))
        ));
        assert!(matches!(
            ListConfig::new("").validate(),
            Err(ConfigError::InvalidListName(_))
        ));
    }

    #[test]
    fn list_config_deserializes_with_defaults() {
        let config: ListConfig =
            serde_json::from_str(r#"{"name":"boards","scoped":true}"#).unwrap();
        assert!(config.scoped);
        assert!(!config.insert_to_bottom);
        assert_eq!(config.rank, RankConfig::default());
    }

    #[test]
    fn alphabet_deserialization_is_validated() {
        let err = serde_json::from_str::<Alphabet>(r#"{"first":"z","last":"a"}"#);
        assert!(err.is_err());
        let alphabet: Alphabet = serde_json::from_str(r#"{"first":"0","last":"9"}"#).unwrap();
        assert_eq!(alphabet.base(), 10);
    }
}
