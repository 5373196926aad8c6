//! # Quantity Module
//!
//! Provides the `BatchQty` type for stock quantities in hundredths of a bilao.
//!
//! ## Integer Hundredths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Deduction fractions (0.5, 0.34, 0.25 bilao) do not survive floating    │
//! │  point arithmetic: three 0.34 deductions must sum to exactly 1.02,      │
//! │  never 1.0199999....                                                    │
//! │                                                                         │
//! │  All quantities are therefore integer hundredths:                       │
//! │    1 bilao        = 100                                                 │
//! │    half bilao     = 50                                                  │
//! │    quarter slice  = 25                                                  │
//! │    3-variety cut  = 34                                                  │
//! │                                                                         │
//! │  Fixed-size stock (Small/Solo Bibingka) is whole units: multiples of   │
//! │  100 in the same representation.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bilao_core::quantity::BatchQty;
//!
//! let half = BatchQty::from_hundredths(50);
//! let needed = half * 3;                  // 1.50 bilao
//! assert_eq!(needed.hundredths(), 150);
//! assert_eq!(needed.to_string(), "1.50");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// BatchQty Type
// =============================================================================

/// A stock quantity in hundredths of a bilao.
///
/// - **i64 (signed)**: movement deltas are negative for deductions
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Ordered/Hashable**: usable as map values and in comparisons
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BatchQty(i64);

/// Hundredths in one whole unit (one bilao, one fixed-size piece).
pub const HUNDREDTHS_PER_UNIT: i64 = 100;

impl BatchQty {
    /// Creates a quantity from hundredths of a bilao.
    #[inline]
    pub const fn from_hundredths(hundredths: i64) -> Self {
        BatchQty(hundredths)
    }

    /// Creates a quantity from whole units.
    ///
    /// Used for fixed-size stock, which is tracked in whole pieces.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        BatchQty(units * HUNDREDTHS_PER_UNIT)
    }

    /// Returns the value in hundredths.
    #[inline]
    pub const fn hundredths(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion.
    #[inline]
    pub const fn whole_units(&self) -> i64 {
        self.0 / HUNDREDTHS_PER_UNIT
    }

    /// Checks the whole-unit invariant for fixed-size stock.
    #[inline]
    pub const fn is_whole_units(&self) -> bool {
        self.0 % HUNDREDTHS_PER_UNIT == 0
    }

    /// Zero quantity.
    #[inline]
    pub const fn zero() -> Self {
        BatchQty(0)
    }

    /// Checks if the quantity is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the quantity is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the quantity is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        BatchQty(self.0.abs())
    }

    /// Returns the smaller of two quantities.
    ///
    /// The allocator walks batches deducting `min(remaining, on_hand)`.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        BatchQty(self.0.min(other.0))
    }

    /// Saturating subtraction, floored at zero.
    ///
    /// Used for shortfall arithmetic: `needed.saturating_sub(available)`.
    #[inline]
    pub const fn saturating_sub(self, other: Self) -> Self {
        let diff = self.0 - other.0;
        if diff < 0 {
            BatchQty(0)
        } else {
            BatchQty(diff)
        }
    }
}

// =============================================================================
// Arithmetic Operators
// =============================================================================

impl Add for BatchQty {
    type Output = BatchQty;

    fn add(self, rhs: BatchQty) -> BatchQty {
        BatchQty(self.0 + rhs.0)
    }
}

impl AddAssign for BatchQty {
    fn add_assign(&mut self, rhs: BatchQty) {
        self.0 += rhs.0;
    }
}

impl Sub for BatchQty {
    type Output = BatchQty;

    fn sub(self, rhs: BatchQty) -> BatchQty {
        BatchQty(self.0 - rhs.0)
    }
}

impl SubAssign for BatchQty {
    fn sub_assign(&mut self, rhs: BatchQty) {
        self.0 -= rhs.0;
    }
}

impl Mul<i64> for BatchQty {
    type Output = BatchQty;

    /// Scales a per-unit fraction by an order quantity.
    fn mul(self, rhs: i64) -> BatchQty {
        BatchQty(self.0 * rhs)
    }
}

// =============================================================================
// Display
// =============================================================================

impl fmt::Display for BatchQty {
    /// Formats as a decimal bilao count, e.g. `1.50` or `-0.25`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(
            f,
            "{}{}.{:02}",
            sign,
            abs / HUNDREDTHS_PER_UNIT,
            abs % HUNDREDTHS_PER_UNIT
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_units() {
        assert_eq!(BatchQty::from_units(3).hundredths(), 300);
        assert_eq!(BatchQty::from_units(3).whole_units(), 3);
    }

    #[test]
    fn test_whole_unit_invariant() {
        assert!(BatchQty::from_units(5).is_whole_units());
        assert!(!BatchQty::from_hundredths(150).is_whole_units());
    }

    #[test]
    fn test_scaling() {
        // half a bilao times an order quantity of 3
        let total = BatchQty::from_hundredths(50) * 3;
        assert_eq!(total.hundredths(), 150);
    }

    #[test]
    fn test_three_variety_cut_is_exact() {
        // 0.34 * 3 is exactly 1.02, never a float artifact
        let total = BatchQty::from_hundredths(34) * 3;
        assert_eq!(total.hundredths(), 102);
    }

    #[test]
    fn test_saturating_sub() {
        let a = BatchQty::from_hundredths(100);
        let b = BatchQty::from_hundredths(150);
        assert_eq!(a.saturating_sub(b), BatchQty::zero());
        assert_eq!(b.saturating_sub(a).hundredths(), 50);
    }

    #[test]
    fn test_display() {
        assert_eq!(BatchQty::from_hundredths(150).to_string(), "1.50");
        assert_eq!(BatchQty::from_hundredths(34).to_string(), "0.34");
        assert_eq!(BatchQty::from_hundredths(-25).to_string(), "-0.25");
        assert_eq!(BatchQty::zero().to_string(), "0.00");
    }

    #[test]
    fn test_min() {
        let a = BatchQty::from_hundredths(75);
        let b = BatchQty::from_hundredths(50);
        assert_eq!(a.min(b), b);
    }
}
