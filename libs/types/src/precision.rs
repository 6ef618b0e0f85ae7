//! Precision Handling for Token Amounts
//!
//! All monetary fields cross the JSON boundary as decimal strings. This module
//! converts them to and from integer base units using each token's declared
//! decimals, without ever passing through floating point.
//!
//! ## Critical Rules
//!
//! 1. **NO FLOATING POINT**: parsing goes through `rust_decimal`, formatting is
//!    pure integer division
//! 2. **No silent rounding**: an input with more fractional digits than the
//!    token supports is rejected, not truncated
//! 3. **Explicit bounds**: values that do not fit in `u128` base units are errors
//!
//! ## Example Usage
//!
//! ```rust
//! use types::precision::{format_units, parse_units};
//!
//! let usdc = parse_units("1.5", 6).unwrap();
//! assert_eq!(usdc, 1_500_000);
//! assert_eq!(format_units(usdc, 6), "1.5");
//! ```

use crate::common::errors::PrecisionError;
use rust_decimal::Decimal;
use std::str::FromStr;

pub type Result<T> = std::result::Result<T, PrecisionError>;

/// Largest supported token decimals; 10^38 still fits in u128.
pub const MAX_DECIMALS: u8 = 38;

/// Parts-per-million scale used for percentages (100% = 100_000_000 ppm of a percent unit)
pub const PERCENT_PPM_SCALE: u128 = 100_000_000;

/// Decimal multiplier `10^decimals`
pub fn decimal_multiplier(decimals: u8) -> Result<u128> {
    if decimals > MAX_DECIMALS {
        return Err(PrecisionError::UnsupportedDecimals(decimals));
    }
    Ok(10u128.pow(decimals as u32))
}

/// Parse a decimal string into base units (`"1.5"` with 6 decimals → `1_500_000`)
pub fn parse_units(input: &str, decimals: u8) -> Result<u128> {
    let value = Decimal::from_str(input.trim()).map_err(|_| PrecisionError::InvalidDecimal {
        input: input.to_string(),
    })?;

    if value.is_sign_negative() && !value.is_zero() {
        return Err(PrecisionError::Negative {
            input: input.to_string(),
        });
    }

    // Trailing zeros do not count as precision
    let value = value.normalize();
    let scale = value.scale();
    if scale > decimals as u32 {
        return Err(PrecisionError::TooManyDecimals {
            input: input.to_string(),
            decimals,
        });
    }

    let mantissa = value.mantissa().unsigned_abs();
    let factor = decimal_multiplier(decimals - scale as u8)?;
    mantissa
        .checked_mul(factor)
        .ok_or_else(|| PrecisionError::Overflow {
            input: input.to_string(),
        })
}

/// Format base units as a decimal string with trailing zeros trimmed.
///
/// Decimals beyond [`MAX_DECIMALS`] are clamped; callers validate decimals when
/// tokens are registered.
pub fn format_units(amount: u128, decimals: u8) -> String {
    let decimals = decimals.min(MAX_DECIMALS);
    if decimals == 0 {
        return amount.to_string();
    }
    let multiplier = 10u128.pow(decimals as u32);
    let whole = amount / multiplier;
    let fractional = amount % multiplier;
    if fractional == 0 {
        return whole.to_string();
    }

    let digits = format!("{:0width$}", fractional, width = decimals as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Convert a percentage (`"0.5"` = half a percent) into millionths of a percent.
///
/// The result is in `0..=PERCENT_PPM_SCALE`; fractional digits beyond six are
/// rounded toward zero.
pub fn percent_to_ppm(percent: Decimal) -> Result<u128> {
    if (percent.is_sign_negative() && !percent.is_zero()) || percent > Decimal::ONE_HUNDRED {
        return Err(PrecisionError::InvalidPercentage {
            input: percent.to_string(),
        });
    }

    let scaled = (percent * Decimal::from(1_000_000u32)).trunc();
    Ok(scaled.mantissa().unsigned_abs() / 10u128.pow(scaled.scale()))
}

/// Decimals used for LP share amounts of a pool whose tokens have
/// `decimals_a` and `decimals_b`.
///
/// LP shares start at `sqrt(amountA * amountB)`, so their natural scale is the
/// mean of the two token scales.
pub const fn lp_decimals(decimals_a: u8, decimals_b: u8) -> u8 {
    ((decimals_a as u16 + decimals_b as u16) / 2) as u8
}
