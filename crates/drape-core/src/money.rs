//! # Money Module
//!
//! Provides the `Money` type for monetary values and `Rate` for percentages.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In the browser:                                                        │
//! │    45.005 * 100 = 4500.499999999999  → rounds to 4500  ❌ WRONG!        │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every breakdown field is an i64 count of minor units.                │
//! │    Decimals from the catalog are converted exactly, once, with          │
//! │    round-half-up, and never come back as floats.                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use drape_core::money::{Money, Rate};
//! use rust_decimal::Decimal;
//!
//! let per_day = Money::from_cents(4500);                  // $45.00
//! let subtotal = per_day * 2;                             // $90.00
//! let insurance = subtotal.apply_rate(Rate::from_bps(2500)).unwrap();
//! assert_eq!(insurance.cents(), 2250);                    // $22.50
//!
//! // Major units → minor units, half-up
//! let total = Money::from_major("45.005".parse::<Decimal>().unwrap()).unwrap();
//! assert_eq!(total.cents(), 4501);
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents for USD).
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  LineItem.price_per_day (Decimal) ──► Σ × days ──► subtotal (Money)     │
/// │                                                                         │
/// │  subtotal ──► insurance (25%) ──┐                                       │
/// │  subtotal ──► tax policy ───────┼──► total ──► PaymentIntent.amount     │
/// │                                 │                    │                  │
/// │                                 └────────────────────▼                  │
/// │                                               Order.total               │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Converts a major-unit amount (dollars) to Money.
    ///
    /// Multiplies by 100 and rounds half-up on the minor unit, so fractional
    /// cents are never sent anywhere.
    ///
    /// ## Returns
    /// `None` if the amount does not fit in an `i64` count of cents.
    ///
    /// ## Example
    /// ```rust
    /// use drape_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// assert_eq!(Money::from_major(Decimal::new(11250, 2)).unwrap().cents(), 11250);
    /// assert_eq!(Money::from_major(Decimal::new(45005, 3)).unwrap().cents(), 4501);
    /// assert_eq!(Money::from_major(Decimal::new(45004, 3)).unwrap().cents(), 4500);
    /// ```
    pub fn from_major(amount: Decimal) -> Option<Self> {
        let cents = amount
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        cents.to_i64().map(Money)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the value in major units as an exact decimal (e.g. `112.50`).
    #[inline]
    pub fn to_major(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (cents) portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
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

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Applies a basis-point rate, rounding half-up to the nearest cent.
    ///
    /// ## Implementation
    /// Integer math on i128: `(amount * bps + 5000) / 10000`.
    /// The +5000 is half of the divisor, which rounds 0.5 cents up.
    /// Only meaningful for non-negative amounts; pricing never applies a
    /// rate to a negative value.
    ///
    /// ## Example
    /// ```rust
    /// use drape_core::money::{Money, Rate};
    ///
    /// // $0.10 × 25% = 2.5 cents → 3 cents
    /// let deposit = Money::from_cents(10).apply_rate(Rate::from_bps(2500)).unwrap();
    /// assert_eq!(deposit.cents(), 3);
    /// ```
    ///
    /// ## Returns
    /// `None` if the result overflows an `i64`.
    pub fn apply_rate(&self, rate: Rate) -> Option<Money> {
        let scaled = (self.0 as i128) * (rate.bps() as i128) + 5000;
        i64::try_from(scaled / 10000).ok().map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money as `$112.50`. Debug/log output only; the storefront formats
/// amounts for display itself.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Multiplication by a day count.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, days: i64) -> Self {
        Money(self.0 * days)
    }
}

// =============================================================================
// Rate
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 2500 bps = 25% (the insurance deposit)
/// 825 bps = 8.25% (a typical sales tax)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(11250);
        assert_eq!(money.cents(), 11250);
        assert_eq!(money.dollars(), 112);
        assert_eq!(money.cents_part(), 50);
    }

    #[test]
    fn test_from_major_rounds_half_up() {
        assert_eq!(Money::from_major(dec("45.005")).unwrap().cents(), 4501);
        assert_eq!(Money::from_major(dec("45.0049")).unwrap().cents(), 4500);
        assert_eq!(Money::from_major(dec("0.005")).unwrap().cents(), 1);
        assert_eq!(Money::from_major(dec("112.5")).unwrap().cents(), 11250);
        assert_eq!(Money::from_major(dec("90")).unwrap().cents(), 9000);
    }

    #[test]
    fn test_from_major_overflow() {
        assert!(Money::from_major(Decimal::MAX).is_none());
    }

    #[test]
    fn test_to_major() {
        assert_eq!(Money::from_cents(11250).to_major(), dec("112.50"));
        assert_eq!(Money::from_cents(1).to_major(), dec("0.01"));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(11250)), "$112.50");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(9000);
        let b = Money::from_cents(2250);

        assert_eq!((a + b).cents(), 11250);
        assert_eq!((a - b).cents(), 6750);
        assert_eq!((b * 4).cents(), 9000);
    }

    #[test]
    fn test_checked_add_overflow() {
        assert!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)).is_none());
        assert_eq!(
            Money::from_cents(1).checked_add(Money::from_cents(2)),
            Some(Money::from_cents(3))
        );
    }

    #[test]
    fn test_apply_rate_insurance() {
        // $90.00 at 25% = $22.50
        let deposit = Money::from_cents(9000).apply_rate(Rate::from_bps(2500)).unwrap();
        assert_eq!(deposit.cents(), 2250);
    }

    #[test]
    fn test_apply_rate_rounds_half_up() {
        // $0.02 at 25% = 0.5 cents → 1 cent
        assert_eq!(Money::from_cents(2).apply_rate(Rate::from_bps(2500)).unwrap().cents(), 1);
        // $0.01 at 25% = 0.25 cents → 0 cents
        assert_eq!(Money::from_cents(1).apply_rate(Rate::from_bps(2500)).unwrap().cents(), 0);
        // $10.00 at 8.25% = 82.5 cents → 83 cents
        assert_eq!(Money::from_cents(1000).apply_rate(Rate::from_bps(825)).unwrap().cents(), 83);
    }

    #[test]
    fn test_apply_rate_overflow() {
        assert!(Money::from_cents(i64::MAX).apply_rate(Rate::from_bps(20000)).is_none());
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        assert!(Money::from_cents(100).is_positive());
        assert!(Money::from_cents(-100).is_negative());
    }

    #[test]
    fn test_rate_display() {
        assert_eq!(Rate::from_bps(2500).to_string(), "25.00%");
        assert_eq!(Rate::from_bps(825).to_string(), "8.25%");
    }
}
