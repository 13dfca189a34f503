//! The single-configuration-bit value type.
//!
//! A [`Bit`] addresses one bit inside a block's segbit footprint: a
//! non-negative index plus the value the feature programs there. The text
//! form used by segbits files is the bare decimal index for a one-bit and a
//! `!` prefix for a zero-bit:
//!
//! ```text
//! 14      bit 14 must be 1
//! !42     bit 42 must be 0
//! ```

use crate::error::DbError;
use std::fmt;
use std::str::FromStr;

/// A single addressed configuration bit.
///
/// Bits order by index first so that patterns sort into footprint order
/// regardless of polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bit {
    /// Bit index, relative to the owning block's offset.
    pub index: u32,
    /// The value the feature programs (true = 1, false = 0).
    pub value: bool,
}

impl Bit {
    /// Creates a new bit.
    pub fn new(index: u32, value: bool) -> Self {
        Self { index, value }
    }
}

impl FromStr for Bit {
    type Err = DbError;

    /// Parses a trimmed bit token: a leading `!` means "must be zero", the
    /// remainder is a non-negative decimal index.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let (value, digits) = match token.strip_prefix('!') {
            Some(rest) => (false, rest),
            None => (true, token),
        };

        let index = digits
            .parse::<u32>()
            .map_err(|e| DbError::Parse(format!("invalid bit token '{token}': {e}")))?;

        Ok(Self { index, value })
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value {
            write!(f, "{}", self.index)
        } else {
            write!(f, "!{}", self.index)
        }
    }
}

/// An ordered sequence of bits realising one feature (or one sub-index of a
/// multi-bit feature).
pub type SegbitPattern = Vec<Bit>;
