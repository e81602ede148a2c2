use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{AppError, AppResult};

/// Minor units per major unit (two decimal places).
const SCALE: i64 = 100;

/// Parse a user-entered amount such as "12.50" into minor units.
/// Rejects non-numeric, negative, zero and over-precise input.
pub fn parse_amount(raw: &str) -> AppResult<i64> {
    let raw = raw.trim();
    let invalid = || AppError::Validation(format!("Invalid amount: '{}'", raw));

    // Decimal::from_str also takes signs and `_` separators; amounts carry neither
    if !raw.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return Err(invalid());
    }

    let digits = if raw.starts_with('.') {
        format!("0{}", raw)
    } else {
        raw.to_string()
    };
    let amount = Decimal::from_str(&digits).map_err(|_| invalid())?;
    if amount.scale() > 2 {
        return Err(AppError::Validation(
            "Amounts support at most two decimal places".to_string(),
        ));
    }
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation("Amount must be greater than zero".to_string()));
    }

    amount
        .checked_mul(dec!(100))
        .and_then(|minor| minor.to_i64())
        .ok_or_else(invalid)
}

/// Format minor units as a decimal string, e.g. 1250 -> "12.50".
pub fn format_amount(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / SCALE as u64, abs % SCALE as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("60").unwrap(), 6000);
        assert_eq!(parse_amount("12.5").unwrap(), 1250);
        assert_eq!(parse_amount(" 0.05 ").unwrap(), 5);
        assert_eq!(parse_amount(".75").unwrap(), 75);
        assert_eq!(parse_amount("7.50").unwrap(), 750);
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        for raw in ["", "abc", "-5", "1.234", "0", "0.00", "1,5", ".", "+3", "1e3", "1_000"] {
            assert!(
                matches!(parse_amount(raw), Err(AppError::Validation(_))),
                "expected validation error for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_parse_amount_rejects_overflow() {
        assert!(matches!(
            parse_amount("99999999999999999999"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1250), "12.50");
        assert_eq!(format_amount(-6000), "-60.00");
        assert_eq!(format_amount(5), "0.05");
    }
}
