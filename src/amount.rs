//! Exact decimal-to-base-unit conversion.
//!
//! A configured human amount like "0.5" with 6 decimals becomes 500_000 base
//! units. All arithmetic is exact big-integer math; floating point would lose
//! precision for 18-decimal chains long before realistic faucet amounts.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;

use crate::errors::AmountError;

/// Convert a decimal token amount to the chain's smallest integer unit:
/// `decimal_amount * 10^decimals`, exactly.
///
/// Amounts with more fractional digits than `decimals` allows are a
/// configuration error; `Config::validate` runs this at startup so the
/// condition is never hit at dispense time.
pub fn to_base_units(decimal_amount: &str, decimals: u32) -> Result<BigInt, AmountError> {
    let parsed = BigDecimal::from_str(decimal_amount.trim())
        .map_err(|_| AmountError::InvalidDecimal(decimal_amount.to_string()))?;

    // digits * 10^-exponent == parsed; normalizing strips trailing zeros so
    // "0.100" is as precise as "0.1".
    let (digits, exponent) = parsed.normalized().into_bigint_and_exponent();

    if digits.sign() == Sign::Minus {
        return Err(AmountError::Negative);
    }
    if exponent > i64::from(decimals) {
        return Err(AmountError::ExcessPrecision { decimals });
    }

    let shift = i64::from(decimals) - exponent;
    if shift > i64::from(u32::MAX) {
        return Err(AmountError::Overflow);
    }

    Ok(digits * num_traits::pow(BigInt::from(10), shift as usize))
}

/// Like [`to_base_units`], narrowed to the `u128` a `Coin` amount carries.
pub fn to_base_units_u128(decimal_amount: &str, decimals: u32) -> Result<u128, AmountError> {
    to_base_units(decimal_amount, decimals)?
        .to_u128()
        .ok_or(AmountError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_amount() {
        assert_eq!(to_base_units("1", 6).unwrap(), BigInt::from(1_000_000u64));
        assert_eq!(to_base_units_u128("1", 6).unwrap(), 1_000_000);
    }

    #[test]
    fn test_fractional_amount() {
        assert_eq!(to_base_units("0.5", 6).unwrap(), BigInt::from(500_000u64));
        assert_eq!(to_base_units_u128("0.1", 18).unwrap(), 100_000_000_000_000_000);
    }

    #[test]
    fn test_trailing_zeros_are_not_precision() {
        assert_eq!(to_base_units_u128("0.100000", 6).unwrap(), 100_000);
        assert_eq!(to_base_units_u128("2.0", 0).unwrap(), 2);
    }

    #[test]
    fn test_exact_at_ten_to_the_thirty() {
        // 10^12 tokens at 18 decimals = 10^30 base units, no rounding.
        let expected = BigInt::parse_bytes(b"1000000000000000000000000000000", 10).unwrap();
        assert_eq!(to_base_units("1000000000000", 18).unwrap(), expected);
        assert_eq!(
            to_base_units_u128("1000000000000", 18).unwrap(),
            1_000_000_000_000_000_000_000_000_000_000
        );
    }

    #[test]
    fn test_zero() {
        assert_eq!(to_base_units_u128("0", 6).unwrap(), 0);
    }

    #[test]
    fn test_excess_precision_rejected() {
        assert_eq!(
            to_base_units("0.1234567", 6).unwrap_err(),
            AmountError::ExcessPrecision { decimals: 6 }
        );
        assert_eq!(
            to_base_units("0.5", 0).unwrap_err(),
            AmountError::ExcessPrecision { decimals: 0 }
        );
    }

    #[test]
    fn test_negative_rejected() {
        assert_eq!(to_base_units("-1", 6).unwrap_err(), AmountError::Negative);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            to_base_units("ten", 6).unwrap_err(),
            AmountError::InvalidDecimal(_)
        ));
        assert!(matches!(
            to_base_units("1.2.3", 6).unwrap_err(),
            AmountError::InvalidDecimal(_)
        ));
        assert!(matches!(
            to_base_units("", 6).unwrap_err(),
            AmountError::InvalidDecimal(_)
        ));
    }

    #[test]
    fn test_u128_overflow_rejected() {
        // 10^24 tokens at 18 decimals = 10^42 base units: exact as a BigInt,
        // too large for a Coin amount.
        assert!(to_base_units("1000000000000000000000000", 18).is_ok());
        assert_eq!(
            to_base_units_u128("1000000000000000000000000", 18).unwrap_err(),
            AmountError::Overflow
        );
    }
}
