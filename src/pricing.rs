//! VAT-aware line pricing.
//!
//! Catalog prices are either VAT-inclusive (tax is backed out of the total) or
//! VAT-exclusive (tax is added on top). Nothing in here rounds: amounts keep
//! full `Decimal` precision through aggregation and are only formatted to two
//! places by [`format_money`] at presentation time.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::Add;
use utoipa::ToSchema;

/// Subtotal (net), VAT and total (gross) of a single priced line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct LineTotals {
    pub subtotal: Decimal,
    pub vat: Decimal,
    pub total: Decimal,
}

impl LineTotals {
    pub const ZERO: LineTotals = LineTotals {
        subtotal: Decimal::ZERO,
        vat: Decimal::ZERO,
        total: Decimal::ZERO,
    };
}

/// Prices `quantity` units of a product.
///
/// * VAT-inclusive: `total = unit_price * quantity`, `subtotal = total / (1 + vat_rate)`,
///   `vat = total - subtotal`.
/// * VAT-exclusive: `subtotal = unit_price * quantity`, `vat = subtotal * vat_rate`,
///   `total = subtotal + vat`.
///
/// A zero quantity prices to all zeros.
pub fn price_line(
    unit_price: Decimal,
    quantity: u64,
    price_includes_vat: bool,
    vat_rate: Decimal,
) -> LineTotals {
    if quantity == 0 {
        return LineTotals::ZERO;
    }

    let extended = unit_price * Decimal::from(quantity);

    if price_includes_vat {
        let total = extended;
        let subtotal = total / (Decimal::ONE + vat_rate);
        LineTotals {
            subtotal,
            vat: total - subtotal,
            total,
        }
    } else {
        let subtotal = extended;
        let vat = subtotal * vat_rate;
        LineTotals {
            subtotal,
            vat,
            total: subtotal + vat,
        }
    }
}

/// Order-level aggregate: the plain sum of line values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub vat: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    pub fn add_line(&mut self, line: &LineTotals) {
        self.subtotal += line.subtotal;
        self.vat += line.vat;
        self.total += line.total;
    }
}

impl Add<LineTotals> for OrderTotals {
    type Output = OrderTotals;

    fn add(mut self, rhs: LineTotals) -> Self::Output {
        self.add_line(&rhs);
        self
    }
}

impl Sum<LineTotals> for OrderTotals {
    fn sum<I: Iterator<Item = LineTotals>>(iter: I) -> Self {
        iter.fold(OrderTotals::default(), |acc, line| acc + line)
    }
}

impl<'a> Sum<&'a LineTotals> for OrderTotals {
    fn sum<I: Iterator<Item = &'a LineTotals>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Rounds to currency precision (2 dp, half away from zero).
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Formats an amount for display and export, always with two decimals.
pub fn format_money(amount: Decimal) -> String {
    format!("{:.2}", round_money(amount))
}

/// Formats a VAT fraction as a percentage without trailing zeros (0.17 -> "17").
pub fn format_rate_percent(rate: Decimal) -> String {
    (rate * Decimal::ONE_HUNDRED).normalize().to_string()
}
