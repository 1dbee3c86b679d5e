//! Display helpers shared by the CLI and embedding applications.

use std::str::FromStr;

use malachite::base::num::arithmetic::traits::DivRem;
use malachite::Natural;

use crate::units::{pow10, UnitsError};

pub const DEFAULT_PREFIX_CHARS: usize = 6;
pub const DEFAULT_SUFFIX_CHARS: usize = 4;
pub const DEFAULT_DISPLAY_DECIMALS: u32 = 4;

/// Shortens an address to `prefix…suffix`; short inputs are returned as-is.
pub fn format_address(address: &str, prefix: usize, suffix: usize) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= prefix + suffix {
        return address.to_string();
    }
    let head: String = chars[..prefix].iter().collect();
    let tail: String = chars[chars.len() - suffix..].iter().collect();
    format!("{head}…{tail}")
}

pub fn format_address_default(address: &str) -> String {
    format_address(address, DEFAULT_PREFIX_CHARS, DEFAULT_SUFFIX_CHARS)
}

/// Renders a minimal-unit integer string for display.
///
/// The value is rounded half-up to `display_decimals` places, trailing zeros
/// are dropped and the integer part is grouped with commas. Non-zero values
/// smaller than the last displayable digit render as `< 0.0001`.
pub fn format_token_amount(
    amount: &str,
    decimals: u32,
    display_decimals: u32,
) -> Result<String, UnitsError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(UnitsError::Empty);
    }
    let value =
        Natural::from_str(trimmed).map_err(|_| UnitsError::Malformed(amount.to_string()))?;
    if value == 0u32 {
        return Ok("0".to_string());
    }

    let scaled = if decimals > display_decimals {
        let unit = pow10(decimals - display_decimals);
        if value < unit {
            return Ok(format!("< {}", smallest_unit(display_decimals)));
        }
        let (quotient, remainder) = value.div_rem(&unit);
        if remainder * Natural::from(2u32) >= unit {
            quotient + Natural::from(1u32)
        } else {
            quotient
        }
    } else {
        value * pow10(display_decimals - decimals)
    };

    let digits = scaled.to_string();
    let places = display_decimals as usize;
    let padded = if digits.len() <= places {
        format!("{}{}", "0".repeat(places + 1 - digits.len()), digits)
    } else {
        digits
    };
    let split = padded.len() - places;
    let whole = group_thousands(&padded[..split]);
    let fraction = padded[split..].trim_end_matches('0');
    if fraction.is_empty() {
        Ok(whole)
    } else {
        Ok(format!("{whole}.{fraction}"))
    }
}

/// Formats a dollar amount with two decimals and thousands separators.
pub fn format_usd(amount: f64) -> String {
    if amount == 0.0 {
        return "$0.00".to_string();
    }
    if amount > 0.0 && amount < 0.01 {
        return "< $0.01".to_string();
    }
    let cents = (amount.abs() * 100.0).round() as u128;
    if cents == 0 {
        return "$0.00".to_string();
    }
    let whole = group_thousands(&(cents / 100).to_string());
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${whole}.{:02}", cents % 100)
}

pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}%")
}

fn smallest_unit(display_decimals: u32) -> String {
    if display_decimals == 0 {
        return "1".to_string();
    }
    format!("0.{}1", "0".repeat(display_decimals as usize - 1))
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (position, digit) in digits.chars().enumerate() {
        if position > 0 && (digits.len() - position) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

/// Checks for a `0x`-prefixed 20-byte hex address.
pub fn is_valid_address(address: &str) -> bool {
    address.parse::<crate::types::Address>().is_ok()
}

pub fn is_valid_tx_hash(hash: &str) -> bool {
    hash.len() == 66
        && hash.starts_with("0x")
        && hash[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Accepts strictly positive decimal amounts.
pub fn is_valid_amount(amount: &str) -> bool {
    match amount.trim().parse::<f64>() {
        Ok(value) => value.is_finite() && value > 0.0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn proptest_config() -> ProptestConfig {
        let cases = std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(64);
        ProptestConfig {
            cases,
            ..ProptestConfig::default()
        }
    }

    #[test]
    fn truncates_long_addresses() {
        assert_eq!(
            format_address_default("0x5FbDB2315678afecb367f032d93F642f64180aa3"),
            "0x5FbD…0aa3"
        );
        assert_eq!(format_address("0x12345678", 6, 4), "0x12345678");
        assert_eq!(format_address("", 6, 4), "");
        assert_eq!(format_address("abcdefgh", 2, 2), "ab…gh");
    }

    #[test]
    fn token_amounts_render_for_display() {
        assert_eq!(format_token_amount("0", 18, 4).expect("fmt"), "0");
        assert_eq!(
            format_token_amount("1500000000000000000", 18, 4).expect("fmt"),
            "1.5"
        );
        assert_eq!(
            format_token_amount("1234567000000000000000", 18, 4).expect("fmt"),
            "1,234.567"
        );
        assert_eq!(
            format_token_amount("99999", 18, 4).expect("fmt"),
            "< 0.0001"
        );
        assert_eq!(format_token_amount("123456", 6, 4).expect("fmt"), "0.1235");
        assert_eq!(format_token_amount("5", 0, 2).expect("fmt"), "5");
        assert!(format_token_amount("1.5", 18, 4).is_err());
        assert!(format_token_amount("", 18, 4).is_err());
    }

    #[test]
    fn usd_and_percent_formatting() {
        assert_eq!(format_usd(0.0), "$0.00");
        assert_eq!(format_usd(0.004), "< $0.01");
        assert_eq!(format_usd(1234.567), "$1,234.57");
        assert_eq!(format_usd(-1.5), "-$1.50");
        assert_eq!(format_usd(-0.004), "$0.00");
        assert_eq!(format_percent(12.3456, 2), "12.35%");
        assert_eq!(format_percent(5.0, 0), "5%");
    }

    #[test]
    fn validation_helpers() {
        assert!(is_valid_address("0x5FbDB2315678afecb367f032d93F642f64180aa3"));
        assert!(!is_valid_address("0x5FbDB"));
        assert!(is_valid_tx_hash(&format!("0x{}", "ab".repeat(32))));
        assert!(!is_valid_tx_hash("0x1234"));
        assert!(is_valid_amount("0.001"));
        assert!(!is_valid_amount("0"));
        assert!(!is_valid_amount("-1"));
        assert!(!is_valid_amount("abc"));
    }

    proptest! {
        #![proptest_config(proptest_config())]
        #[test]
        fn short_addresses_are_unchanged(address in "[0-9a-zA-Zx]{0,10}") {
            prop_assert_eq!(format_address_default(&address), address);
        }

        #[test]
        fn long_addresses_keep_head_and_tail(address in "[0-9a-fx]{11,64}") {
            let expected = format!("{}…{}", &address[..6], &address[address.len() - 4..]);
            prop_assert_eq!(format_address_default(&address), expected);
        }

        #[test]
        fn token_amount_is_monotonic(a in 0u128..10u128.pow(24), b in 0u128..10u128.pow(24)) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let render = |value: u128| {
                let text = format_token_amount(&value.to_string(), 18, 4).expect("fmt");
                match text.strip_prefix("< ") {
                    Some(_) => 0.0,
                    None => text.replace(',', "").parse::<f64>().expect("number"),
                }
            };
            prop_assert!(render(low) <= render(high));
        }
    }
}
