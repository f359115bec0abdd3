//! Base-unit to display-unit conversion.
//!
//! Balances arrive from the provider as integer amounts in the smallest
//! unit (wei). The display value is the full integer magnitude divided by
//! `10^decimals`, rounded half-up to two fractional digits only at the end.
//! The divisor is never rounded and the numerator is never truncated.

use std::str::FromStr;

use alloy::primitives::U256;
use rust_decimal::Decimal;

use super::error::WalletError;

/// Decimal places of the native currency (1 ETH = 10^18 wei).
pub const ETHER_DECIMALS: u32 = 18;

/// Fractional digits kept in the display value.
pub const DISPLAY_PRECISION: u32 = 2;

/// Largest `decimals` for which `10^decimals` fits in 256 bits.
const MAX_DECIMALS: u32 = 77;

/// Parse a provider quantity into a 256-bit unsigned integer.
///
/// Accepts decimal strings (`"1500000000000000000"`) and `0x`-prefixed
/// hex quantities (`"0x14d1120d7b160000"`), the form returned by
/// `eth_getBalance`.
pub fn parse_quantity(raw: &str) -> Result<U256, WalletError> {
    let trimmed = raw.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some("") => return Err(WalletError::InvalidAmount(format!("empty hex quantity {raw:?}"))),
        Some(hex) => U256::from_str_radix(hex, 16),
        None if trimmed.is_empty() => {
            return Err(WalletError::InvalidAmount("empty amount".to_string()));
        }
        None if !trimmed.bytes().all(|b| b.is_ascii_digit()) => {
            return Err(WalletError::InvalidAmount(format!("non-numeric amount {raw:?}")));
        }
        None => U256::from_str(trimmed),
    };

    parsed.map_err(|e| WalletError::InvalidAmount(format!("{raw:?}: {e}")))
}

/// Convert a base-unit amount into display units, rounded to 2 places.
///
/// `to_display_units("1500000000000000000", 18) == 1.50`
pub fn to_display_units(raw_amount: &str, decimals: u32) -> Result<Decimal, WalletError> {
    let amount = parse_quantity(raw_amount)?;
    scale_to_display(amount, decimals, DISPLAY_PRECISION)
}

/// Scale an integer amount down by `10^decimals`, keeping `precision`
/// fractional digits with half-up rounding.
///
/// The division runs on the exact integer: `round(amount * 10^p / 10^d)`.
pub fn scale_to_display(amount: U256, decimals: u32, precision: u32) -> Result<Decimal, WalletError> {
    if decimals > MAX_DECIMALS {
        return Err(WalletError::InvalidAmount(format!(
            "decimals {decimals} exceeds {MAX_DECIMALS}"
        )));
    }

    let ten = U256::from(10u8);
    let divisor = ten.pow(U256::from(decimals));
    let scale = ten.pow(U256::from(precision));
    let half = divisor / U256::from(2u8);

    let scaled = amount
        .checked_mul(scale)
        .and_then(|v| v.checked_add(half))
        .ok_or_else(|| WalletError::InvalidAmount(format!("{amount} overflows 256 bits")))?;
    let units = scaled / divisor;

    let mantissa = i128::try_from(units)
        .map_err(|_| WalletError::InvalidAmount(format!("{amount} out of display range")))?;

    Decimal::try_from_i128_with_scale(mantissa, precision)
        .map_err(|e| WalletError::InvalidAmount(format!("{amount}: {e}")))
}

/// Render a display balance with its currency symbol.
pub fn format_display(balance: Decimal, symbol: &str) -> String {
    format!("{balance} {symbol}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_one_ether() {
        let value = to_display_units("1000000000000000000", ETHER_DECIMALS).unwrap();
        assert_eq!(value, dec!(1.00));
        assert_eq!(value.to_string(), "1.00");
    }

    #[test]
    fn test_one_and_a_half_ether() {
        let value = to_display_units("1500000000000000000", ETHER_DECIMALS).unwrap();
        assert_eq!(value, dec!(1.50));
        assert_eq!(value.to_string(), "1.50");
    }

    #[test]
    fn test_zero() {
        let value = to_display_units("0", ETHER_DECIMALS).unwrap();
        assert_eq!(value, dec!(0.00));
        assert_eq!(value.to_string(), "0.00");
    }

    #[test]
    fn test_hex_quantity() {
        // 0x14d1120d7b160000 == 1.5e18
        let value = to_display_units("0x14d1120d7b160000", ETHER_DECIMALS).unwrap();
        assert_eq!(value, dec!(1.50));
    }

    #[test]
    fn test_rounds_result_not_divisor() {
        // 1.234999... ETH rounds to 1.23, 1.235 ETH rounds to 1.24
        assert_eq!(
            to_display_units("1234999999999999999", ETHER_DECIMALS).unwrap(),
            dec!(1.23)
        );
        assert_eq!(
            to_display_units("1235000000000000000", ETHER_DECIMALS).unwrap(),
            dec!(1.24)
        );
    }

    #[test]
    fn test_dust_rounds_to_zero() {
        assert_eq!(to_display_units("4999999999999999", ETHER_DECIMALS).unwrap(), dec!(0.00));
        assert_eq!(to_display_units("5000000000000000", ETHER_DECIMALS).unwrap(), dec!(0.01));
    }

    #[test]
    fn test_large_balance_keeps_full_magnitude() {
        // 123,456,789.987654321 ETH
        let value = to_display_units("123456789987654321000000000", ETHER_DECIMALS).unwrap();
        assert_eq!(value, dec!(123456789.99));
    }

    #[test]
    fn test_beyond_f64_precision() {
        // 2^53 + 1 wei-scaled amounts lose precision in f64 but not here
        let value = to_display_units("9007199254740993000000000000000000", ETHER_DECIMALS).unwrap();
        assert_eq!(value, dec!(9007199254740993.00));
    }

    #[test]
    fn test_malformed_amounts() {
        for raw in ["", "abc", "-1", "1.5", "0x", "0xzz", "12e18"] {
            let err = to_display_units(raw, ETHER_DECIMALS).unwrap_err();
            assert!(
                matches!(err, WalletError::InvalidAmount(_)),
                "expected InvalidAmount for {raw:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_zero_decimals() {
        assert_eq!(to_display_units("42", 0).unwrap(), dec!(42.00));
    }

    #[test]
    fn test_excessive_decimals_rejected() {
        assert!(to_display_units("1", 78).is_err());
    }

    #[test]
    fn test_format_display() {
        assert_eq!(format_display(dec!(2.00), "ETH"), "2.00 ETH");
    }
}
