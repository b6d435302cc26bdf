//! Subtotal, shipping, tax and total computation.
//!
//! Carts and orders are priced by the same [`PricingPolicy`], so the totals a
//! shopper sees in the cart are the totals the order records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::round_money;

/// Store-wide pricing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Subtotals strictly above this ship free.
    pub free_shipping_threshold: Decimal,
    /// Flat shipping fee below the threshold.
    pub shipping_fee: Decimal,
    /// Tax rate as a fraction (0.08 is 8%).
    pub tax_rate: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Decimal::new(35, 0),
            shipping_fee: Decimal::new(599, 2),
            tax_rate: Decimal::new(8, 2),
        }
    }
}

/// Priced summary of a set of lines.
///
/// Every component is rounded to cents. `total` is computed from the
/// unrounded components and rounded once, so it can differ by a cent from the
/// sum of the displayed parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub item_count: u32,
    pub shipping: Decimal,
    pub tax: Decimal,
    #[serde(default, skip_serializing_if = "Decimal::is_zero")]
    pub discount: Decimal,
    pub total: Decimal,
}

impl PriceBreakdown {
    /// Breakdown of an empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            subtotal: Decimal::ZERO,
            item_count: 0,
            shipping: Decimal::ZERO,
            tax: Decimal::ZERO,
            discount: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }
}

impl PricingPolicy {
    /// Shipping owed for a subtotal.
    ///
    /// Nothing is charged for an empty cart.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Decimal, item_count: u32) -> Decimal {
        if item_count == 0 || subtotal > self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.shipping_fee
        }
    }

    /// Price `(unit_price, quantity)` pairs, subtracting `discount` from the total.
    ///
    /// Arithmetic saturates at [`Decimal::MAX`] instead of overflowing. Callers
    /// that persist the result compare it against
    /// [`MAX_MONEY`](crate::types::MAX_MONEY).
    #[must_use]
    pub fn quote<I>(&self, lines: I, discount: Decimal) -> PriceBreakdown
    where
        I: IntoIterator<Item = (Decimal, u32)>,
    {
        let (subtotal, item_count) = lines.into_iter().fold(
            (Decimal::ZERO, 0_u32),
            |(subtotal, count), (price, quantity)| {
                (
                    subtotal.saturating_add(price.saturating_mul(Decimal::from(quantity))),
                    count.saturating_add(quantity),
                )
            },
        );

        let shipping = self.shipping_for(subtotal, item_count);
        let tax = subtotal.saturating_mul(self.tax_rate);
        let discount = discount.max(Decimal::ZERO);
        let gross = subtotal.saturating_add(shipping).saturating_add(tax);
        let total = round_money(gross.saturating_sub(discount)).max(Decimal::ZERO);

        PriceBreakdown {
            subtotal: round_money(subtotal),
            item_count,
            shipping: round_money(shipping),
            tax: round_money(tax),
            discount: round_money(discount),
            total,
        }
    }
}
