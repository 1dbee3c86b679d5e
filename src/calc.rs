//! Advisory DeFi figures computed in scaled integer arithmetic.
//!
//! Every helper returns `"0"` when an input fails to parse or a denominator
//! is zero. The results are display values only.

use malachite::Integer;

use crate::units::{format_units, parse_units, pow10, UnitsError};

const FALLBACK: &str = "0";

fn or_fallback(result: Result<Option<String>, UnitsError>) -> String {
    match result {
        Ok(Some(value)) => value,
        Ok(None) | Err(_) => FALLBACK.to_string(),
    }
}

fn checked_div(numerator: Integer, denominator: &Integer) -> Option<Integer> {
    if *denominator == 0 {
        return None;
    }
    Some(numerator / denominator)
}

/// `amount_in * reserve_out / ((reserve_in + amount_in) * reserve_in) * 100`,
/// rendered with `decimals_out` fractional digits.
pub fn calculate_price_impact(
    amount_in: &str,
    reserve_in: &str,
    reserve_out: &str,
    decimals_in: u32,
    decimals_out: u32,
) -> String {
    or_fallback((|| -> Result<Option<String>, UnitsError> {
        let amount_in = parse_units(amount_in, decimals_in)?;
        let reserve_in = parse_units(reserve_in, decimals_in)?;
        let reserve_out = parse_units(reserve_out, decimals_out)?;

        let numerator =
            &amount_in * &reserve_out * Integer::from(100u32) * Integer::from(pow10(decimals_in));
        let denominator = (&reserve_in + &amount_in) * &reserve_in;
        Ok(checked_div(numerator, &denominator).map(|impact| format_units(&impact, decimals_out)))
    })())
}

/// `(expected - actual) / expected * 100`; negative when `actual` exceeds `expected`.
pub fn calculate_slippage(expected: &str, actual: &str, decimals: u32) -> String {
    or_fallback((|| -> Result<Option<String>, UnitsError> {
        let expected = parse_units(expected, decimals)?;
        let actual = parse_units(actual, decimals)?;
        let numerator = (&expected - &actual) * Integer::from(100u32) * Integer::from(pow10(decimals));
        Ok(checked_div(numerator, &expected).map(|slippage| format_units(&slippage, decimals)))
    })())
}

/// Value of `lp_amount` pool tokens: the holder's share of both reserves,
/// each valued at its unit price.
pub fn calculate_lp_value(
    lp_amount: &str,
    total_supply: &str,
    reserve0: &str,
    reserve1: &str,
    token0_price: &str,
    token1_price: &str,
    decimals: u32,
) -> String {
    or_fallback((|| -> Result<Option<String>, UnitsError> {
        let lp = parse_units(lp_amount, decimals)?;
        let total_supply = parse_units(total_supply, decimals)?;
        let reserve0 = parse_units(reserve0, decimals)?;
        let reserve1 = parse_units(reserve1, decimals)?;
        let price0 = parse_units(token0_price, decimals)?;
        let price1 = parse_units(token1_price, decimals)?;

        let pool_value = reserve0 * price0 + reserve1 * price1;
        let denominator = total_supply * Integer::from(pow10(decimals));
        Ok(checked_div(pool_value * lp, &denominator).map(|value| format_units(&value, decimals)))
    })())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_impact_follows_constant_product_approximation() {
        assert_eq!(calculate_price_impact("10", "100", "100", 18, 18), "9.090909090909090909");
        assert_eq!(calculate_price_impact("1", "1", "2", 18, 18), "100.0");
    }

    #[test]
    fn price_impact_is_zero_for_empty_reserve() {
        assert_eq!(calculate_price_impact("10", "0", "100", 18, 18), "0");
        assert_eq!(calculate_price_impact("0", "0", "0", 18, 18), "0");
        assert_eq!(calculate_price_impact("abc", "100", "100", 18, 18), "0");
    }

    #[test]
    fn slippage_is_signed_percentage() {
        assert_eq!(calculate_slippage("100", "95", 18), "5.0");
        assert_eq!(calculate_slippage("100", "105", 18), "-5.0");
        assert_eq!(calculate_slippage("0", "1", 18), "0");
        assert_eq!(calculate_slippage("1.5", "x", 18), "0");
    }

    #[test]
    fn lp_value_sums_both_reserves() {
        // 10% of a pool holding 1000 A @ 2.0 and 500 B @ 4.0
        assert_eq!(
            calculate_lp_value("10", "100", "1000", "500", "2", "4", 18),
            "400.0"
        );
        assert_eq!(calculate_lp_value("10", "0", "1000", "500", "2", "4", 18), "0");
    }
}
