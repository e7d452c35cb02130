//! Invoice totals computation.
//!
//! All amounts are integer minor units (cents). Aggregates are rounded once
//! over the whole line-item set, never per line and then summed; per-line
//! rounding is applied only to the denormalized `line_total` column.

use crate::models::LineItemInput;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Derived invoice aggregates. `total = subtotal + tax_total` by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub subtotal: i64,
    pub tax_total: i64,
    pub total: i64,
}

/// Round half-up to the nearest integer minor unit.
fn round_minor(amount: Decimal) -> i64 {
    amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        // Saturates if a caller exceeds i64 minor units; DTO validation
        // bounds inputs well below this.
        .unwrap_or(i64::MAX)
}

/// Tax-exclusive amount of one line: `quantity x unit_price`.
fn line_net(item: &LineItemInput) -> Decimal {
    item.quantity * Decimal::from(item.unit_price)
}

/// Tax amount of one line: `quantity x unit_price x tax_rate / 100`.
fn line_tax(item: &LineItemInput) -> Decimal {
    line_net(item) * item.tax_rate / Decimal::ONE_HUNDRED
}

/// Tax-inclusive total of one line, rounded to minor units.
pub fn line_total(item: &LineItemInput) -> i64 {
    round_minor(line_net(item) + line_tax(item))
}

/// Compute invoice aggregates from the full line-item set.
///
/// `subtotal` and `tax_total` are each rounded once over their aggregate
/// sums; `total` is their integer sum with no further rounding.
pub fn compute_totals(items: &[LineItemInput]) -> InvoiceTotals {
    let net: Decimal = items.iter().map(line_net).sum();
    let tax: Decimal = items.iter().map(line_tax).sum();

    let subtotal = round_minor(net);
    let tax_total = round_minor(tax);

    InvoiceTotals {
        subtotal,
        tax_total,
        total: subtotal + tax_total,
    }
}
