use bigdecimal::BigDecimal;
use num_bigint::{BigInt, BigUint};

/// Convert a smallest-unit integer into a decimal amount, exactly
pub fn to_decimal_amount(raw: &BigUint, decimals: u8) -> BigDecimal {
    BigDecimal::new(BigInt::from(raw.clone()), i64::from(decimals))
}

/// Format an address for display (`0x1234...abcd`)
pub fn format_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Format a USD amount with two decimals
pub fn format_usd(value: &BigDecimal) -> String {
    format!("${}", value.round(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn converts_by_decimals_without_precision_loss() {
        let raw = BigUint::from(1_500_000u32);
        assert_eq!(to_decimal_amount(&raw, 6), BigDecimal::from_str("1.5").unwrap());
        assert_eq!(
            to_decimal_amount(&raw, 18),
            BigDecimal::from_str("0.0000000000015").unwrap()
        );

        // larger than u128
        let whale = BigUint::parse_bytes(b"123456789012345678901234567890123456789012", 10).unwrap();
        assert_eq!(
            to_decimal_amount(&whale, 18),
            BigDecimal::from_str("123456789012345678901234.567890123456789012").unwrap()
        );
    }

    #[test]
    fn display_helpers() {
        assert_eq!(format_address("0x52908400098527886E0F7030069857D2E4169EE7"), "0x5290...9EE7");
        assert_eq!(format_address("short"), "short");
        assert_eq!(format_usd(&BigDecimal::from_str("1234.5678").unwrap()), "$1234.57");
    }
}
