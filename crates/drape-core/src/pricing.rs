//! # Pricing Engine
//!
//! Turns cart line items into a [`PricingBreakdown`].
//!
//! ## Pricing Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        price(items)                                     │
//! │                                                                         │
//! │  items.is_empty()? ──────────────────────────────► EmptyCart            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  every item: price > 0, 1 <= days <= 365? ───────► InvalidLineItem      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  exact  = Σ price_per_day × rental_days     (Decimal, no rounding)      │
//! │  subtotal  = round_half_up(exact, cents)                                │
//! │  insurance = round_half_up(subtotal × 25%, cents)                       │
//! │  tax       = TaxPolicy(subtotal, shipping)  (default: 0)                │
//! │  total     = subtotal + insurance + tax     (exact integer sum)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  total <= 0 or overflow? ────────────────────────► InvalidTotal         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PricingBreakdown                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every component is a whole number of cents, so the total is their exact
//! sum and each component is within half a cent of its exact value.

use std::fmt::Debug;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::{PricingError, PricingResult};
use crate::money::{Money, Rate};
use crate::types::{CartLineItem, PricingBreakdown, ShippingDetails};
use crate::validation::validate_line_item;
use crate::DEFAULT_INSURANCE_RATE_BPS;

// =============================================================================
// Tax Policy
// =============================================================================

/// Computes tax for a priced cart.
///
/// `shipping` is `None` when pricing a cart before the checkout form is
/// filled in (e.g. the cart page).
pub trait TaxPolicy: Debug + Send + Sync {
    /// Tax in minor units. Must not be negative.
    ///
    /// Returns `None` when the tax cannot be represented; the cart is then
    /// rejected rather than priced without tax.
    fn compute_tax(&self, subtotal: Money, shipping: Option<&ShippingDetails>) -> Option<Money>;
}

/// No tax. The storefront's behavior today.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTax;

impl TaxPolicy for NoTax {
    fn compute_tax(&self, _subtotal: Money, _shipping: Option<&ShippingDetails>) -> Option<Money> {
        Some(Money::zero())
    }
}

/// One rate on the subtotal, regardless of destination.
#[derive(Debug, Clone, Copy)]
pub struct FlatRateTax {
    rate: Rate,
}

impl FlatRateTax {
    pub fn new(rate: Rate) -> Self {
        FlatRateTax { rate }
    }
}

impl TaxPolicy for FlatRateTax {
    fn compute_tax(&self, subtotal: Money, _shipping: Option<&ShippingDetails>) -> Option<Money> {
        subtotal.apply_rate(self.rate)
    }
}

// =============================================================================
// Pricing Engine
// =============================================================================

/// Prices carts with a fixed insurance rate and a pluggable tax policy.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    insurance_rate: Rate,
    tax_policy: Arc<dyn TaxPolicy>,
}

impl PricingEngine {
    /// Creates an engine with the given insurance rate and no tax.
    pub fn new(insurance_rate: Rate) -> Self {
        PricingEngine {
            insurance_rate,
            tax_policy: Arc::new(NoTax),
        }
    }

    /// Replaces the tax policy.
    pub fn with_tax_policy(mut self, policy: impl TaxPolicy + 'static) -> Self {
        self.tax_policy = Arc::new(policy);
        self
    }

    /// Replaces the tax policy with an already shared one.
    pub fn with_shared_tax_policy(mut self, policy: Arc<dyn TaxPolicy>) -> Self {
        self.tax_policy = policy;
        self
    }

    pub fn insurance_rate(&self) -> Rate {
        self.insurance_rate
    }

    /// Prices a cart with no destination known.
    pub fn price(&self, items: &[CartLineItem]) -> PricingResult<PricingBreakdown> {
        self.price_for(items, None)
    }

    /// Prices a cart for a destination.
    ///
    /// ## Errors
    /// - [`PricingError::EmptyCart`] if `items` is empty
    /// - [`PricingError::InvalidLineItem`] for the first bad item
    /// - [`PricingError::InvalidTotal`] if the total is not chargeable
    pub fn price_for(
        &self,
        items: &[CartLineItem],
        shipping: Option<&ShippingDetails>,
    ) -> PricingResult<PricingBreakdown> {
        if items.is_empty() {
            return Err(PricingError::EmptyCart);
        }

        let mut exact_subtotal = Decimal::ZERO;
        for (index, item) in items.iter().enumerate() {
            validate_line_item(index, item)?;

            let line_total = item
                .line_total()
                .ok_or_else(|| PricingError::invalid_total("line total overflowed"))?;
            exact_subtotal = exact_subtotal
                .checked_add(line_total)
                .ok_or_else(|| PricingError::invalid_total("subtotal overflowed"))?;
        }

        let subtotal = Money::from_major(exact_subtotal)
            .ok_or_else(|| PricingError::invalid_total("subtotal overflowed"))?;

        let insurance_deposit = subtotal
            .apply_rate(self.insurance_rate)
            .ok_or_else(|| PricingError::invalid_total("insurance deposit overflowed"))?;

        let tax = self
            .tax_policy
            .compute_tax(subtotal, shipping)
            .ok_or_else(|| PricingError::invalid_total("tax overflowed"))?;
        if tax.is_negative() {
            return Err(PricingError::invalid_total(format!(
                "tax policy returned negative tax {tax}"
            )));
        }

        let total = subtotal
            .checked_add(insurance_deposit)
            .and_then(|sum| sum.checked_add(tax))
            .ok_or_else(|| PricingError::invalid_total("total overflowed"))?;

        if !total.is_positive() {
            return Err(PricingError::invalid_total(format!(
                "total must be positive, got {total}"
            )));
        }

        Ok(PricingBreakdown {
            subtotal,
            insurance_deposit,
            tax,
            total,
        })
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        PricingEngine::new(Rate::from_bps(DEFAULT_INSURANCE_RATE_BPS))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: &str, days: i64) -> CartLineItem {
        CartLineItem::new("item", "Item", price.parse().unwrap(), days)
    }

    #[derive(Debug)]
    struct NegativeTax;

    impl TaxPolicy for NegativeTax {
        fn compute_tax(
            &self,
            _subtotal: Money,
            _shipping: Option<&ShippingDetails>,
        ) -> Option<Money> {
            Some(Money::from_cents(-1))
        }
    }

    #[test]
    fn test_single_item_scenario() {
        // [{price: 45, days: 2}], tax 0 → 90.00 / 22.50 / 112.50
        let breakdown = PricingEngine::default().price(&[item("45", 2)]).unwrap();

        assert_eq!(breakdown.subtotal, Money::from_cents(9000));
        assert_eq!(breakdown.insurance_deposit, Money::from_cents(2250));
        assert_eq!(breakdown.tax, Money::zero());
        assert_eq!(breakdown.total, Money::from_cents(11250));
    }

    #[test]
    fn test_empty_cart() {
        assert_eq!(PricingEngine::default().price(&[]), Err(PricingError::EmptyCart));
    }

    #[test]
    fn test_negative_days_identifies_item() {
        let items = vec![item("20", 1), CartLineItem::new("coat-9", "Wool Coat", Decimal::from(10), -1)];
        let err = PricingEngine::default().price(&items).unwrap_err();

        match err {
            PricingError::InvalidLineItem { index, name, .. } => {
                assert_eq!(index, 1);
                assert_eq!(name, "Wool Coat");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_zero_price_rejected() {
        let err = PricingEngine::default().price(&[item("0", 3)]).unwrap_err();
        assert!(matches!(err, PricingError::InvalidLineItem { index: 0, .. }));
    }

    #[test]
    fn test_subtotal_sums_all_lines() {
        let items = vec![item("45", 2), item("12.75", 3), item("8.99", 1)];
        let breakdown = PricingEngine::default().price(&items).unwrap();

        // 90 + 38.25 + 8.99 = 137.24
        assert_eq!(breakdown.subtotal.cents(), 13724);
        // 137.24 × 25% = 34.31
        assert_eq!(breakdown.insurance_deposit.cents(), 3431);
        assert_eq!(breakdown.total.cents(), 13724 + 3431);
    }

    #[test]
    fn test_fractional_cent_prices_round_half_up() {
        // 10.005 × 1 = 10.005 → 10.01
        let breakdown = PricingEngine::default().price(&[item("10.005", 1)]).unwrap();
        assert_eq!(breakdown.subtotal.cents(), 1001);
        // 10.01 × 25% = 2.5025 → 2.50
        assert_eq!(breakdown.insurance_deposit.cents(), 250);
        assert_eq!(breakdown.total.cents(), 1251);
    }

    #[test]
    fn test_insurance_rounding_half_up() {
        // 0.10 × 25% = 0.025 → 0.03
        let breakdown = PricingEngine::default().price(&[item("0.10", 1)]).unwrap();
        assert_eq!(breakdown.insurance_deposit.cents(), 3);
        assert_eq!(breakdown.total.cents(), 13);
    }

    #[test]
    fn test_total_invariant_over_many_carts() {
        let engine = PricingEngine::default().with_tax_policy(FlatRateTax::new(Rate::from_bps(825)));
        let prices = ["0.01", "0.99", "1.50", "12.345", "45", "99.995", "250.10"];

        for (i, price) in prices.iter().enumerate() {
            for days in [1, 2, 7, 30] {
                let items = vec![item(price, days), item(prices[(i + 3) % prices.len()], 1)];
                let b = engine.price(&items).unwrap();

                assert_eq!(b.total, b.subtotal + b.insurance_deposit + b.tax);
                assert!(b.total.is_positive());

                let exact: Decimal = items.iter().map(|it| it.line_total().unwrap()).sum();
                let drift = (b.subtotal.to_major() - exact).abs();
                assert!(drift <= Decimal::new(1, 2), "subtotal drifted {drift}");

                assert_eq!(
                    b.insurance_deposit,
                    b.subtotal.apply_rate(Rate::from_bps(2500)).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_flat_rate_tax() {
        let engine = PricingEngine::default().with_tax_policy(FlatRateTax::new(Rate::from_bps(1000)));
        let breakdown = engine.price(&[item("45", 2)]).unwrap();

        assert_eq!(breakdown.tax.cents(), 900);
        assert_eq!(breakdown.total.cents(), 9000 + 2250 + 900);
    }

    #[test]
    fn test_negative_tax_rejected() {
        let engine = PricingEngine::default().with_tax_policy(NegativeTax);
        let err = engine.price(&[item("45", 2)]).unwrap_err();
        assert!(matches!(err, PricingError::InvalidTotal { .. }));
    }

    #[test]
    fn test_tax_overflow_rejects_cart() {
        // Subtotal and deposit fit; tax at ~429,496% does not.
        let engine =
            PricingEngine::default().with_tax_policy(FlatRateTax::new(Rate::from_bps(u32::MAX)));
        let gown = CartLineItem::new("gown", "Gown", Decimal::from(1_000_000_000), 365);

        let err = engine.price(&[gown]).unwrap_err();
        assert!(
            matches!(&err, PricingError::InvalidTotal { reason } if reason.contains("tax")),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn test_total_rounding_to_zero_rejected() {
        // 0.001 × 1 rounds to a zero subtotal; nothing chargeable.
        let err = PricingEngine::default().price(&[item("0.001", 1)]).unwrap_err();
        assert!(matches!(err, PricingError::InvalidTotal { .. }));
    }

    #[test]
    fn test_overflow_is_invalid_total() {
        let huge = CartLineItem::new("gown", "Gown", Decimal::MAX, 365);
        let err = PricingEngine::default().price(&[huge]).unwrap_err();
        assert!(matches!(err, PricingError::InvalidTotal { .. }));
    }

    #[test]
    fn test_custom_insurance_rate() {
        let engine = PricingEngine::new(Rate::from_bps(1000));
        let breakdown = engine.price(&[item("45", 2)]).unwrap();
        assert_eq!(breakdown.insurance_deposit.cents(), 900);
        assert_eq!(engine.insurance_rate().bps(), 1000);
    }
}
