//! Fixed-width kernel byte counters and single-wrap delta correction.

use serde::{Deserialize, Serialize};

/// Bit width of a raw kernel byte counter.
///
/// Darwin's `if_data` reports `ifi_ibytes`/`ifi_obytes` as 32-bit values, so
/// [`CounterWidth::W32`] is the default. Any width from 1 to 64 bits is
/// accepted for platforms that report differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct CounterWidth(u32);

impl CounterWidth {
    /// 32-bit counters (`if_data` on Darwin).
    pub const W32: Self = Self(32);
    /// 64-bit counters (`if_data64`).
    pub const W64: Self = Self(64);

    /// Width of `bits` bits, or `None` outside `1..=64`.
    pub const fn new(bits: u32) -> Option<Self> {
        if bits >= 1 && bits <= 64 {
            Some(Self(bits))
        } else {
            None
        }
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Largest raw value representable at this width.
    pub const fn max_value(self) -> u64 {
        if self.0 == 64 {
            u64::MAX
        } else {
            (1u64 << self.0) - 1
        }
    }

    /// Bytes the counter occupies in a record (1, 2, 4 or 8).
    pub const fn storage_bytes(self) -> usize {
        match self.0 {
            1..=8 => 1,
            9..=16 => 2,
            17..=32 => 4,
            _ => 8,
        }
    }

    /// Truncate `raw` to this width.
    pub const fn mask(self, raw: u64) -> u64 {
        raw & self.max_value()
    }

    /// Bytes counted between two raw readings.
    ///
    /// A reading lower than the previous one is taken as exactly one wrap:
    /// `current + 2^W - previous`. More than one wrap between samples cannot be
    /// told apart from a single one.
    pub const fn delta(self, previous: u64, current: u64) -> u64 {
        self.mask(self.mask(current).wrapping_sub(self.mask(previous)))
    }
}

impl Default for CounterWidth {
    fn default() -> Self {
        Self::W32
    }
}

/// A counter width outside `1..=64` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCounterWidth(pub u32);

impl std::fmt::Display for InvalidCounterWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "counter width must be 1 to 64 bits, got {}", self.0)
    }
}

impl std::error::Error for InvalidCounterWidth {}

impl TryFrom<u32> for CounterWidth {
    type Error = InvalidCounterWidth;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Self::new(bits).ok_or(InvalidCounterWidth(bits))
    }
}

impl From<CounterWidth> for u32 {
    fn from(width: CounterWidth) -> Self {
        width.0
    }
}

impl std::fmt::Display for CounterWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-bit", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_delta_is_plain_difference() {
        assert_eq!(CounterWidth::W32.delta(1000, 3000), 2000);
        assert_eq!(CounterWidth::W32.delta(3000, 3000), 0);
    }

    #[test]
    fn wrapped_delta_adds_modulus() {
        // 100 + 2^32 - 3000
        assert_eq!(CounterWidth::W32.delta(3000, 100), 4_294_964_396);
        assert_eq!(CounterWidth::W32.delta(u32::MAX as u64, 0), 1);
    }

    #[test]
    fn wrap_at_narrow_width() {
        let w8 = CounterWidth::new(8).unwrap();
        assert_eq!(w8.delta(250, 4), 10);
        assert_eq!(w8.storage_bytes(), 1);
    }

    #[test]
    fn wrap_at_full_width() {
        assert_eq!(CounterWidth::W64.delta(u64::MAX - 1, 3), 5);
        assert_eq!(CounterWidth::W64.max_value(), u64::MAX);
    }

    #[test]
    fn rejects_out_of_range_widths() {
        assert!(CounterWidth::new(0).is_none());
        assert!(CounterWidth::new(65).is_none());
        assert_eq!(CounterWidth::new(32), Some(CounterWidth::W32));
    }

    #[test]
    fn deserialize_checks_range() {
        let w: CounterWidth = serde_json::from_str("16").unwrap();
        assert_eq!(w.bits(), 16);
        assert!(serde_json::from_str::<CounterWidth>("65").is_err());
        assert!(serde_json::from_str::<CounterWidth>("0").is_err());
        assert_eq!(serde_json::to_string(&CounterWidth::W32).unwrap(), "32");
    }

    #[test]
    fn try_from_rejects_wide_counters() {
        assert_eq!(CounterWidth::try_from(65), Err(InvalidCounterWidth(65)));
        assert_eq!(u32::from(CounterWidth::W64), 64);
    }

    #[test]
    fn storage_rounds_up() {
        assert_eq!(CounterWidth::new(12).unwrap().storage_bytes(), 2);
        assert_eq!(CounterWidth::W32.storage_bytes(), 4);
        assert_eq!(CounterWidth::new(48).unwrap().storage_bytes(), 8);
    }
}
