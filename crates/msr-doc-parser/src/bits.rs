//! Bit-range tokens (`"63:52"`, `"7"`) and the reserved-mask fold built from them.
//!
//! Both vendor extractors capture the leading token of a table row and hand it to
//! [`parse_bit_range`]. The resulting [`BitRange`]s of every block sharing one address are folded
//! into a single `u64` by [`combine_masks`].

use std::borrow::Cow;
use std::fmt;

use crate::error::{ParseError, Result};

/// Highest bit index of a 64-bit register.
pub const MAX_BIT: u8 = 63;

/// Intel manuals write `MAXPHYADDR` for "the implementation's top physical address bit"; we
/// approximate it with the top bit of the register.
const MAXPHYADDR: &str = "MAXPHYADDR";

/// An inclusive span of bit positions (`low..=high`) within a 64-bit register.
///
/// Always satisfies `low <= high <= 63`; the constructors refuse anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitRange {
    high: u8,
    low: u8,
}

impl BitRange {
    /// `None` unless `low <= high <= 63`.
    pub fn new(high: u8, low: u8) -> Option<Self> {
        (low <= high && high <= MAX_BIT).then_some(Self { high, low })
    }

    /// Single-bit range (`high == low`).
    pub fn bit(n: u8) -> Option<Self> {
        Self::new(n, n)
    }

    pub fn high(self) -> u8 {
        self.high
    }

    pub fn low(self) -> u8 {
        self.low
    }

    /// Mask with every bit in `low..=high` set.
    pub fn mask(self) -> u64 {
        // `1 << 64` overflows, so the top bit is special-cased.
        let upper = if self.high >= MAX_BIT {
            u64::MAX
        } else {
            (1u64 << (self.high + 1)) - 1
        };
        let lower = (1u64 << self.low) - 1;
        upper & !lower
    }
}

impl fmt::Display for BitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.high == self.low {
            write!(f, "{}", self.high)
        } else {
            write!(f, "{}:{}", self.high, self.low)
        }
    }
}

/// Replace every `MAXPHYADDR` in `line` with `63`.
pub fn substitute_maxphyaddr(line: &str) -> Cow<'_, str> {
    if line.contains(MAXPHYADDR) {
        Cow::Owned(line.replace(MAXPHYADDR, "63"))
    } else {
        Cow::Borrowed(line)
    }
}

/// Parse a `high:low` or single-bit token.
///
/// The token is trimmed first. Pairs are taken as written (high first); a pair with `high < low`
/// or a bound above 63 is rejected as malformed rather than reordered or clamped.
pub fn parse_bit_range(token: &str) -> Result<BitRange> {
    let token = token.trim();
    let malformed = || ParseError::MalformedBitRange {
        token: token.to_string(),
    };

    match token.split_once(':') {
        Some((high, low)) => {
            let high = parse_bit_index(high).ok_or_else(malformed)?;
            let low = parse_bit_index(low).ok_or_else(malformed)?;
            if high < low {
                return Err(malformed());
            }
            Ok(BitRange { high, low })
        }
        None => {
            let n = parse_bit_index(token).ok_or_else(malformed)?;
            Ok(BitRange { high: n, low: n })
        }
    }
}

fn parse_bit_index(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Long digit runs (years, page numbers) overflow `u8`; that's just another malformed token.
    let n: u8 = s.parse().ok()?;
    (n <= MAX_BIT).then_some(n)
}

/// Fold ranges into one mask: the union of every `low..=high` span.
///
/// Order-independent and idempotent, so ranges from several blocks can be combined in any order.
pub fn combine_masks<I>(ranges: I) -> u64
where
    I: IntoIterator<Item = BitRange>,
{
    ranges.into_iter().fold(0u64, |acc, r| acc | r.mask())
}


#[cfg(all(test, not(target_arch = "wasm32")))]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn bit_range() -> impl Strategy<Value = BitRange> {
        (0u8..=MAX_BIT, 0u8..=MAX_BIT).prop_map(|(a, b)| BitRange {
            high: a.max(b),
            low: a.min(b),
        })
    }

    proptest! {
        #[test]
        fn combine_is_commutative(
            a in proptest::collection::vec(bit_range(), 0..8),
            b in proptest::collection::vec(bit_range(), 0..8),
        ) {
            let ab = combine_masks(a.iter().chain(b.iter()).copied());
            let ba = combine_masks(b.iter().chain(a.iter()).copied());
            prop_assert_eq!(ab, ba);
        }

        #[test]
        fn combine_is_associative(
            a in proptest::collection::vec(bit_range(), 0..8),
            b in proptest::collection::vec(bit_range(), 0..8),
            c in proptest::collection::vec(bit_range(), 0..8),
        ) {
            let left = combine_masks(a.iter().chain(b.iter()).copied()) | combine_masks(c.iter().copied());
            let right = combine_masks(a.iter().copied()) | combine_masks(b.iter().chain(c.iter()).copied());
            prop_assert_eq!(left, right);
            prop_assert_eq!(left, combine_masks(a.iter().chain(&b).chain(&c).copied()));
        }

        #[test]
        fn combine_is_idempotent(a in proptest::collection::vec(bit_range(), 0..8)) {
            let once = combine_masks(a.iter().copied());
            let twice = combine_masks(a.iter().chain(a.iter()).copied());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn mask_covers_exactly_the_span(r in bit_range()) {
            let mask = r.mask();
            prop_assert_eq!(mask.count_ones(), u32::from(r.high - r.low) + 1);
            prop_assert_eq!(mask.trailing_zeros(), u32::from(r.low));
            prop_assert_eq!(63 - mask.leading_zeros(), u32::from(r.high));
        }
    }
}
