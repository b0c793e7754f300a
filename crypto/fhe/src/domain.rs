//! Plaintext domain: bounded unsigned integers.
//!
//! Plaintexts are `u64`. Every encrypted input declares an inclusive range
//! `[0, max]` and the range proof attached to it attests membership.

use serde::{Deserialize, Serialize};

use crate::{FHEError, FHEResult};

/// Bit width of the plaintext domain; results are reduced mod 2^64
pub const DOMAIN_BITS: u32 = 64;

/// Upper bound of a royalty rate, in percent
pub const MAX_ROYALTY_RATE: u64 = 100;

/// Royalty rate used when the uploader does not pick one
pub const DEFAULT_ROYALTY_RATE: u64 = 90;

/// Longest listening session accepted by default (24 hours)
pub const DEFAULT_MAX_PLAY_SECONDS: u64 = 86_400;

/// Inclusive range `[0, max]`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueRange {
    max: u64,
}

impl ValueRange {
    /// The whole `u64` domain
    pub const FULL: ValueRange = ValueRange { max: u64::MAX };

    pub const fn up_to(max: u64) -> Self {
        Self { max }
    }

    /// Royalty rate, 0-100 percent
    pub const fn royalty_rate() -> Self {
        Self::up_to(MAX_ROYALTY_RATE)
    }

    /// Royalty amount, any `u64`
    pub const fn royalty_amount() -> Self {
        Self::FULL
    }

    /// Play duration in seconds, capped at one session
    pub const fn play_duration(max_seconds: u64) -> Self {
        Self::up_to(max_seconds)
    }

    pub const fn max(&self) -> u64 {
        self.max
    }

    pub const fn contains(&self, value: u64) -> bool {
        value <= self.max
    }

    /// Whether every value of `other` is inside this range
    pub const fn covers(&self, other: &ValueRange) -> bool {
        other.max <= self.max
    }

    /// Number of bits needed to write `max` (at least one)
    pub const fn bit_width(&self) -> u32 {
        let width = u64::BITS - self.max.leading_zeros();
        if width == 0 {
            1
        } else {
            width
        }
    }

    /// Whether the range is exactly `[0, 2^k - 1]` for `k = bit_width()`
    pub const fn is_power_of_two_span(&self) -> bool {
        self.max != 0 && self.max.wrapping_add(1) & self.max == 0
    }

    /// Check `value` against the range
    pub fn check(&self, value: u64) -> FHEResult<()> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(FHEError::OutOfRange {
                value,
                max: self.max,
            })
        }
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// A plaintext together with the range it is declared in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DomainValue {
    value: u64,
    range: ValueRange,
}

impl DomainValue {
    /// Construct a value, rejecting it when outside `range`
    pub fn new(value: u64, range: ValueRange) -> FHEResult<Self> {
        range.check(value)?;
        Ok(Self { value, range })
    }

    /// A value in the full `u64` domain
    pub fn unbounded(value: u64) -> Self {
        Self {
            value,
            range: ValueRange::FULL,
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn range(&self) -> ValueRange {
        self.range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_width() {
        assert_eq!(ValueRange::up_to(0).bit_width(), 1);
        assert_eq!(ValueRange::up_to(1).bit_width(), 1);
        assert_eq!(ValueRange::up_to(100).bit_width(), 7);
        assert_eq!(ValueRange::up_to(127).bit_width(), 7);
        assert_eq!(ValueRange::up_to(128).bit_width(), 8);
        assert_eq!(ValueRange::FULL.bit_width(), 64);
    }

    #[test]
    fn test_power_of_two_span() {
        assert!(ValueRange::up_to(1).is_power_of_two_span());
        assert!(ValueRange::up_to(127).is_power_of_two_span());
        assert!(ValueRange::FULL.is_power_of_two_span());
        assert!(!ValueRange::up_to(0).is_power_of_two_span());
        assert!(!ValueRange::royalty_rate().is_power_of_two_span());
        assert!(!ValueRange::play_duration(DEFAULT_MAX_PLAY_SECONDS).is_power_of_two_span());
    }

    #[test]
    fn test_royalty_rate_bounds() {
        assert!(DomainValue::new(0, ValueRange::royalty_rate()).is_ok());
        assert!(DomainValue::new(100, ValueRange::royalty_rate()).is_ok());
        assert_eq!(
            DomainValue::new(150, ValueRange::royalty_rate()),
            Err(FHEError::OutOfRange {
                value: 150,
                max: 100
            })
        );
    }

    #[test]
    fn test_covers() {
        let wide = ValueRange::up_to(1000);
        assert!(wide.covers(&ValueRange::up_to(10)));
        assert!(!ValueRange::up_to(10).covers(&wide));
        assert!(ValueRange::FULL.covers(&wide));
    }
}
