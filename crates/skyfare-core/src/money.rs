//! # Money Module
//!
//! Provides the `Amount` type for handling monetary values safely.
//!
//! ## Why Integer Micro-Units?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A percentage tax produces fractional amounts BEFORE rounding:          │
//! │    7.5% of 123.45 = 9.25875, and the rounding-reconciliation step      │
//! │    needs the true unrounded sum across sibling payments.                │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Micro-Units                                      │
//! │    1 major currency unit = 1_000_000 micro-units                        │
//! │    9.25875 is stored exactly as 9_258_750 micros                        │
//! │    Rounding to the currency's unit happens ONCE, explicitly             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use skyfare_core::money::{Amount, RoundingDir, RoundingUnit};
//!
//! let fare = Amount::from_units(100);          // 100.00
//! let tax = fare.percent_bps(750);             // 7.50 unrounded
//! let unit = RoundingUnit::hundredth();        // round to 0.01
//! let rounded = tax.rounded(unit, RoundingDir::Nearest);
//! assert_eq!(rounded, Amount::from_micros(7_500_000));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// =============================================================================
// Amount Type
// =============================================================================

/// Micro-units per major currency unit.
pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// A monetary value in micro-units (1/1_000_000 of the major unit).
///
/// ## Design Decisions
/// - **i64 (signed)**: rounding corrections can be negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Currency-agnostic**: the owning record carries the currency code;
///   arithmetic never mixes currencies because the pipeline computes one
///   payment currency per transaction
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// Creates an Amount from micro-units.
    #[inline]
    pub const fn from_micros(micros: i64) -> Self {
        Amount(micros)
    }

    /// Creates an Amount from whole major units.
    ///
    /// ## Example
    /// ```rust
    /// use skyfare_core::money::Amount;
    ///
    /// let fare = Amount::from_units(250); // 250.00
    /// assert_eq!(fare.micros(), 250_000_000);
    /// ```
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Amount(units * MICROS_PER_UNIT)
    }

    /// Returns the value in micro-units.
    #[inline]
    pub const fn micros(&self) -> i64 {
        self.0
    }

    /// Returns zero.
    #[inline]
    pub const fn zero() -> Self {
        Amount(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Amount(self.0.abs())
    }

    /// Applies a percentage given in basis points (750 = 7.5%), unrounded.
    ///
    /// Intermediate math uses i128 to prevent overflow; the result is
    /// truncated at micro-unit resolution, which is far below any
    /// currency's rounding unit.
    pub fn percent_bps(&self, bps: i64) -> Amount {
        let micros = (self.0 as i128 * bps as i128) / 10_000;
        Amount(micros as i64)
    }

    /// Rounds to a multiple of `unit` in the given direction.
    pub fn rounded(&self, unit: RoundingUnit, dir: RoundingDir) -> Amount {
        standard_round(*self, unit, dir)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows the amount with six decimal places (debugging only;
/// response formatting applies the currency's actual decimals).
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(
            f,
            "{}{}.{:06}",
            sign,
            abs / MICROS_PER_UNIT,
            abs % MICROS_PER_UNIT
        )
    }
}

impl Add for Amount {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Amount(self.0 + other.0)
    }
}

impl AddAssign for Amount {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Amount {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Amount(self.0 - other.0)
    }
}

impl SubAssign for Amount {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Amount {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Amount(-self.0)
    }
}

/// Multiplication by quantity (e.g. per-segment charges).
impl Mul<i64> for Amount {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Amount(self.0 * qty)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |acc, a| acc + a)
    }
}

// =============================================================================
// Rounding
// =============================================================================

/// The granularity a tax amount is rounded to (e.g. 0.01, 1, 5).
///
/// Always positive; `RoundingUnit::none()` (zero) means "leave untouched".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoundingUnit(i64);

impl RoundingUnit {
    /// A rounding unit from micro-units. Non-positive values collapse to
    /// `none`.
    pub const fn from_micros(micros: i64) -> Self {
        if micros > 0 {
            RoundingUnit(micros)
        } else {
            RoundingUnit(0)
        }
    }

    /// Round to the nearest hundredth of a unit (the common currency case).
    pub const fn hundredth() -> Self {
        RoundingUnit(MICROS_PER_UNIT / 100)
    }

    /// Round to the nearest whole unit.
    pub const fn unit() -> Self {
        RoundingUnit(MICROS_PER_UNIT)
    }

    /// No rounding.
    pub const fn none() -> Self {
        RoundingUnit(0)
    }

    /// Returns the granularity in micro-units (zero = no rounding).
    pub const fn micros(&self) -> i64 {
        self.0
    }
}

/// Direction of a standard round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingDir {
    /// Round up to the next multiple.
    Up,
    /// Round down to the previous multiple.
    Down,
    /// Round to the nearest multiple, half away from zero.
    #[default]
    Nearest,
    /// Leave the amount untouched.
    NoRounding,
}

/// Rounds `amount` to a multiple of `unit` in direction `dir`.
///
/// This is the math behind the default `TaxRoundingInfoService`; hosts with
/// nation-specific rounding tables provide their own service implementation.
pub fn standard_round(amount: Amount, unit: RoundingUnit, dir: RoundingDir) -> Amount {
    let u = unit.micros();
    if u == 0 || dir == RoundingDir::NoRounding {
        return amount;
    }
    let a = amount.micros();
    let rounded = match dir {
        RoundingDir::Down => a.div_euclid(u) * u,
        RoundingDir::Up => -((-a).div_euclid(u)) * u,
        RoundingDir::Nearest => {
            let half_up = (a.abs() + u / 2) / u * u;
            if a < 0 {
                -half_up
            } else {
                half_up
            }
        }
        RoundingDir::NoRounding => a,
    };
    Amount::from_micros(rounded)
}

// =============================================================================
// Unit Tests
// =============================================================================
