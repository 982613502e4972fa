//! Whole-unit prices and order totals.
//!
//! Prices are integer amounts in whole currency units. Shipping and tax are
//! flat-rate constants; Opticart is not a tax or shipping rules engine.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Flat shipping charge applied to every non-empty order.
pub const SHIPPING_FLAT_RATE: Price = Price::new(100);

/// Tax rate applied to the order subtotal, in percent.
pub const TAX_RATE_PERCENT: i64 = 5;

/// A price in whole currency units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// Zero price.
    pub const ZERO: Self = Self(0);

    /// Create a new price from whole units.
    #[must_use]
    pub const fn new(units: i64) -> Self {
        Self(units)
    }

    /// Get the amount in whole units.
    #[must_use]
    pub const fn units(&self) -> i64 {
        self.0
    }

    /// Multiply by a line quantity, returning `None` on overflow.
    #[must_use]
    pub fn checked_mul(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Self)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<i64> for Price {
    fn from(units: i64) -> Self {
        Self(units)
    }
}

/// Formats as `Tk 1,234`.
impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}Tk {grouped}")
    }
}

/// Breakdown of what a customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    /// Sum of `unit_price * quantity` over the order lines.
    pub subtotal: Price,
    /// Flat shipping charge (zero for an empty subtotal).
    pub shipping: Price,
    /// Tax on the subtotal, rounded to whole units.
    pub tax: Price,
    /// `subtotal + shipping + tax`.
    pub total: Price,
}

impl OrderTotals {
    /// Compute shipping, tax and grand total for a subtotal.
    #[must_use]
    pub fn for_subtotal(subtotal: Price) -> Self {
        let shipping = if subtotal == Price::ZERO {
            Price::ZERO
        } else {
            SHIPPING_FLAT_RATE
        };
        let tax = tax_on(subtotal);

        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }
}

/// Tax on a subtotal, rounded half away from zero.
fn tax_on(subtotal: Price) -> Price {
    let rate = Decimal::new(TAX_RATE_PERCENT, 2);
    Decimal::from(subtotal.units())
        .checked_mul(rate)
        .map(|tax| tax.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|tax| tax.to_i64())
        .map_or(Price::ZERO, Price::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_mul() {
        assert_eq!(Price::new(3000).checked_mul(2), Some(Price::new(6000)));
        assert_eq!(Price::new(i64::MAX).checked_mul(2), None);
    }

    #[test]
    fn test_sum() {
        let total: Price = [Price::new(10), Price::new(25)].into_iter().sum();
        assert_eq!(total, Price::new(35));
        let empty: Price = std::iter::empty().sum();
        assert_eq!(empty, Price::ZERO);
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Price::new(0).to_string(), "Tk 0");
        assert_eq!(Price::new(999).to_string(), "Tk 999");
        assert_eq!(Price::new(6400).to_string(), "Tk 6,400");
        assert_eq!(Price::new(1_234_567).to_string(), "Tk 1,234,567");
        assert_eq!(Price::new(-1500).to_string(), "-Tk 1,500");
    }

    #[test]
    fn test_totals_for_prescription_lens_order() {
        let totals = OrderTotals::for_subtotal(Price::new((2500 + 500) * 2));
        assert_eq!(totals.subtotal, Price::new(6000));
        assert_eq!(totals.shipping, Price::new(100));
        assert_eq!(totals.tax, Price::new(300));
        assert_eq!(totals.total, Price::new(6400));
    }

    #[test]
    fn test_tax_rounds_half_away_from_zero() {
        // 5% of 10 = 0.5 -> 1
        assert_eq!(OrderTotals::for_subtotal(Price::new(10)).tax, Price::new(1));
        // 5% of 29 = 1.45 -> 1
        assert_eq!(OrderTotals::for_subtotal(Price::new(29)).tax, Price::new(1));
    }

    #[test]
    fn test_empty_subtotal_has_no_shipping() {
        let totals = OrderTotals::for_subtotal(Price::ZERO);
        assert_eq!(totals.total, Price::ZERO);
    }
}
