//! Financial breakdown calculation using rust_decimal for precision
//!
//! Splits an accepted offer amount into platform fee, tax, and the escrow
//! held for the seller. All arithmetic is done on `Decimal` internally,
//! then converted to `f64` for storage/serialization.
//!
//! Fee and tax are percentages of the full amount. Escrow is a percentage
//! of what remains after fee and tax; when no escrow percentage is
//! configured the whole remainder is escrowed, so the three parts sum to
//! the amount exactly.
//!
//! The calculation itself is total: amounts are range-checked where they
//! enter the system (request validation, config parsing), not here.

use rust_decimal::prelude::*;

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Percentage configuration for the breakdown
#[derive(Debug, Clone)]
pub struct BreakdownConfig {
    /// Platform fee, percent of the full amount
    pub fee_percent: f64,
    /// Tax, percent of the full amount
    pub tax_percent: f64,
    /// Percent of the post-fee remainder held in escrow; None escrows all of it
    pub escrow_percent: Option<f64>,
}

/// The three-way split of an accepted offer amount
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinancialBreakdown {
    pub application_fee_amount: f64,
    pub tax_amount: f64,
    pub escrow_amount: f64,
}

/// Convert f64 to Decimal for calculation
#[inline]
fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

#[inline]
fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Split `amount` into fee, tax, and escrow per `config`.
///
/// Fee and tax are rounded first; the remainder is computed from the
/// rounded values so the default split sums back to `amount` exactly.
pub fn calculate_breakdown(amount: f64, config: &BreakdownConfig) -> FinancialBreakdown {
    let total = to_decimal(amount);
    let fee = round_money(total * to_decimal(config.fee_percent) / Decimal::ONE_HUNDRED);
    let tax = round_money(total * to_decimal(config.tax_percent) / Decimal::ONE_HUNDRED);

    let remainder = total - fee - tax;
    let escrow = match config.escrow_percent {
        Some(pct) => round_money(remainder * to_decimal(pct) / Decimal::ONE_HUNDRED),
        None => remainder,
    };

    FinancialBreakdown {
        application_fee_amount: to_f64(fee),
        tax_amount: to_f64(tax),
        escrow_amount: to_f64(escrow),
    }
}
