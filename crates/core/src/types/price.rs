//! Money rounding.
//!
//! Amounts are plain [`Decimal`]s in the store currency's standard unit
//! (rupees, dollars). Every derived amount that leaves the system goes through
//! [`round_money`].

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept for money.
pub const MONEY_SCALE: u32 = 2;

/// Largest amount a `NUMERIC(12, 2)` money column holds (9,999,999,999.99).
pub const MAX_MONEY: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, MONEY_SCALE);

/// Round an amount to two decimal places, halves away from zero.
///
/// ```
/// use rust_decimal::Decimal;
/// use shoplane_core::round_money;
///
/// assert_eq!(round_money(Decimal::new(10_005, 3)), Decimal::new(1_001, 2));
/// assert_eq!(round_money(Decimal::new(10_004, 3)), Decimal::new(1_000, 2));
/// ```
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
