//! Money formatting using rust_decimal for precision
//!
//! Amounts travel as `f64` in job JSON. Every printed amount goes through
//! `Decimal` so rounding is half away from zero, not binary-float rounding.

use rust_decimal::prelude::*;

/// Rounding strategy for monetary values (2 decimal places, half away from zero)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Convert f64 to Decimal; non-finite values become zero
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_else(|| {
        tracing::error!(value = ?value, "Non-finite f64 in monetary value, defaulting to zero");
        Decimal::ZERO
    })
}

/// Round to 2 decimal places, normalising negative zero
pub fn round_money(value: Decimal) -> Decimal {
    let rounded = value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() { Decimal::ZERO } else { rounded }
}

/// Exactly two decimal digits: `100` -> `"100.00"`
pub fn format_amount(value: f64) -> String {
    format_decimal(to_decimal(value))
}

pub fn format_decimal(value: Decimal) -> String {
    format!("{:.2}", round_money(value))
}

/// Signed amount for adjustment lines: `"+0.40"` / `"-1.25"`, zero unsigned
pub fn format_signed(value: Decimal) -> String {
    let rounded = round_money(value);
    if rounded.is_sign_positive() && !rounded.is_zero() {
        format!("+{:.2}", rounded)
    } else {
        format!("{:.2}", rounded)
    }
}

/// Tax or discount rate without trailing zeros: `2.5` -> `"2.5"`, `5.0` -> `"5"`
pub fn format_rate(rate: f64) -> String {
    to_decimal(rate).normalize().to_string()
}

/// `unit_price * quantity`, rounded
pub fn line_total(unit_price: f64, quantity: u32) -> Decimal {
    round_money(to_decimal(unit_price) * Decimal::from(quantity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount_two_decimals() {
        assert_eq!(format_amount(100.0), "100.00");
        assert_eq!(format_amount(2.5), "2.50");
        assert_eq!(format_amount(-0.0), "0.00");
    }

    #[test]
    fn test_format_signed() {
        assert_eq!(format_signed(to_decimal(0.4)), "+0.40");
        assert_eq!(format_signed(to_decimal(-1.25)), "-1.25");
        assert_eq!(format_signed(Decimal::ZERO), "0.00");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(2.5), "2.5");
        assert_eq!(format_rate(5.0), "5");
        assert_eq!(format_rate(12.25), "12.25");
    }

    #[test]
    fn test_line_total_precision() {
        // 0.1 * 3 is 0.30000000000000004 in f64
        assert_eq!(format_decimal(line_total(0.1, 3)), "0.30");
        assert_eq!(format_decimal(line_total(10.99, 3)), "32.97");
    }
}
