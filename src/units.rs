//! Fixed-point conversion between human decimal strings and minimal units.
//!
//! Values are carried as arbitrary-precision integers so amounts never pass
//! through floating point. Rendering follows the usual wallet convention of
//! always keeping at least one fractional digit (`1.0`, `0.5`).

use std::str::FromStr;

use malachite::base::num::arithmetic::traits::{Pow, UnsignedAbs};
use malachite::{Integer, Natural};
use thiserror::Error;

use crate::types::Wei;

/// Decimals of the native asset.
pub const ETHER_DECIMALS: u32 = 18;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitsError {
    #[error("empty amount")]
    Empty,
    #[error("malformed decimal amount `{0}`")]
    Malformed(String),
    #[error("amount `{value}` has more than {decimals} fractional digits")]
    TooManyDecimals { value: String, decimals: u32 },
    #[error("amount `{0}` is negative")]
    Negative(String),
}

pub fn pow10(exponent: u32) -> Natural {
    Natural::from(10u32).pow(u64::from(exponent))
}

/// Parses a decimal string such as `"1.25"` into minimal units.
pub fn parse_units(value: &str, decimals: u32) -> Result<Integer, UnitsError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(UnitsError::Empty);
    }
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let mut parts = unsigned.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();
    let malformed = || UnitsError::Malformed(value.to_string());
    if whole.is_empty() && fraction.is_empty() {
        return Err(malformed());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(malformed());
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(UnitsError::TooManyDecimals {
            value: value.to_string(),
            decimals,
        });
    }

    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(if whole.is_empty() { "0" } else { whole });
    digits.push_str(fraction);
    for _ in fraction.len()..decimals as usize {
        digits.push('0');
    }
    let magnitude = Natural::from_str(&digits).map_err(|_| malformed())?;
    let amount = Integer::from(magnitude);
    Ok(if negative { -amount } else { amount })
}

/// Parses a non-negative decimal amount into minimal units.
pub fn parse_units_unsigned(value: &str, decimals: u32) -> Result<Natural, UnitsError> {
    let amount = parse_units(value, decimals)?;
    if amount < 0 {
        return Err(UnitsError::Negative(value.to_string()));
    }
    Ok(amount.unsigned_abs())
}

/// Renders minimal units as a decimal string with `decimals` fractional places.
pub fn format_units(value: &Integer, decimals: u32) -> String {
    let negative = *value < 0;
    let digits = value.unsigned_abs_ref().to_string();
    let decimals = decimals as usize;
    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };
    let split = padded.len() - decimals;
    let whole = &padded[..split];
    let fraction = padded[split..].trim_end_matches('0');
    let fraction = if fraction.is_empty() { "0" } else { fraction };
    let sign = if negative { "-" } else { "" };
    format!("{sign}{whole}.{fraction}")
}

pub fn format_natural_units(value: &Natural, decimals: u32) -> String {
    format_units(&Integer::from(value), decimals)
}

pub fn parse_ether(value: &str) -> Result<Wei, UnitsError> {
    parse_units_unsigned(value, ETHER_DECIMALS).map(Wei::from_natural)
}

pub fn format_ether(value: &Wei) -> String {
    format_natural_units(value.as_natural(), ETHER_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_amounts() {
        assert_eq!(
            parse_units("1.5", 18).expect("parse"),
            Integer::from(1_500_000_000_000_000_000u128)
        );
        assert_eq!(parse_units("0.001", 6).expect("parse"), Integer::from(1_000));
        assert_eq!(parse_units(".5", 1).expect("parse"), Integer::from(5));
        assert_eq!(parse_units("7", 0).expect("parse"), Integer::from(7));
        assert_eq!(parse_units("-2.5", 1).expect("parse"), Integer::from(-25));
        assert_eq!(parse_units("1.2300", 2).expect("parse"), Integer::from(123));
    }

    #[test]
    fn rejects_bad_amounts() {
        assert_eq!(parse_units("", 18), Err(UnitsError::Empty));
        assert!(matches!(parse_units("1.2.3", 18), Err(UnitsError::Malformed(_))));
        assert!(matches!(parse_units("abc", 18), Err(UnitsError::Malformed(_))));
        assert!(matches!(parse_units(".", 18), Err(UnitsError::Malformed(_))));
        assert!(matches!(
            parse_units("0.1234567", 6),
            Err(UnitsError::TooManyDecimals { decimals: 6, .. })
        ));
        assert!(matches!(
            parse_units_unsigned("-1", 18),
            Err(UnitsError::Negative(_))
        ));
    }

    #[test]
    fn formats_with_one_fraction_digit_minimum() {
        assert_eq!(format_units(&Integer::from(1_000_000u32), 6), "1.0");
        assert_eq!(format_units(&Integer::from(1_500_000u32), 6), "1.5");
        assert_eq!(format_units(&Integer::from(5u32), 6), "0.000005");
        assert_eq!(format_units(&Integer::from(0u32), 18), "0.0");
        assert_eq!(format_units(&Integer::from(-25), 1), "-2.5");
        assert_eq!(format_units(&Integer::from(42u32), 0), "42.0");
    }

    #[test]
    fn ether_helpers_use_eighteen_decimals() {
        let wei = parse_ether("0.001").expect("parse");
        assert_eq!(wei, Wei::from_u128(1_000_000_000_000_000));
        assert_eq!(format_ether(&wei), "0.001");
    }
}
