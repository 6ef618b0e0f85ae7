//! Fixed-point integer arithmetic with explicit rounding
//!
//! Every state-affecting calculation in the engine goes through these helpers.
//! Operands are `u128` base units; products are formed in 256 bits so a
//! multiply-then-divide can never overflow silently.
//!
//! ## Rounding policy
//!
//! Callers pick the direction per operation. Amounts paid out of a pool round
//! down; amounts owed to a pool round up. Division by zero is always an error,
//! never a zero result.

use primitive_types::U256;
use thiserror::Error;

/// Basis-point denominator (10 000 = 100%)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Errors that can occur during fixed-point arithmetic
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    /// Result does not fit in the target width
    #[error("Arithmetic overflow: {0}")]
    Overflow(&'static str),

    /// Division by zero in fixed-point arithmetic
    #[error("Division by zero in fixed-point arithmetic")]
    DivisionByZero,
}

pub type Result<T> = std::result::Result<T, MathError>;

/// Rounding direction for divisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Toward zero (floor for unsigned values)
    Down,
    /// Away from zero (ceiling for unsigned values)
    Up,
}

/// Widen a `u128` to 256 bits
#[inline(always)]
pub fn widen(value: u128) -> U256 {
    U256::from(value)
}

/// Full 256-bit product of two `u128` values; cannot overflow
#[inline]
pub fn full_mul(a: u128, b: u128) -> U256 {
    widen(a) * widen(b)
}

/// Narrow a 256-bit value back to `u128`
#[inline]
pub fn narrow(value: U256, context: &'static str) -> Result<u128> {
    if value.bits() > 128 {
        return Err(MathError::Overflow(context));
    }
    Ok(value.low_u128())
}

/// `numerator / denominator` on 256-bit values with the given rounding
pub fn div_wide(numerator: U256, denominator: U256, rounding: Rounding) -> Result<U256> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let (quotient, remainder) = numerator.div_mod(denominator);
    match rounding {
        Rounding::Down => Ok(quotient),
        Rounding::Up if remainder.is_zero() => Ok(quotient),
        Rounding::Up => quotient
            .checked_add(U256::one())
            .ok_or(MathError::Overflow("rounding up")),
    }
}

/// `a * b / denominator` with a 256-bit intermediate
///
/// # Examples
/// ```
/// use amm::fixed_point::{mul_div, Rounding};
///
/// assert_eq!(mul_div(10, 10, 3, Rounding::Down).unwrap(), 33);
/// assert_eq!(mul_div(10, 10, 3, Rounding::Up).unwrap(), 34);
/// assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX, Rounding::Down).unwrap(), u128::MAX);
/// ```
pub fn mul_div(a: u128, b: u128, denominator: u128, rounding: Rounding) -> Result<u128> {
    let quotient = div_wide(full_mul(a, b), widen(denominator), rounding)?;
    narrow(quotient, "mul_div result")
}

/// Apply a basis-point fraction: `amount * bps / 10_000`
pub fn apply_bps(amount: u128, bps: u32, rounding: Rounding) -> Result<u128> {
    mul_div(amount, bps as u128, BPS_DENOMINATOR, rounding)
}

/// Floor of the square root of `a * b`, computed without overflow.
///
/// The result always fits in `u128` because `sqrt(u128::MAX²) < 2^128`.
pub fn sqrt_product(a: u128, b: u128) -> u128 {
    full_mul(a, b).integer_sqrt().low_u128()
}

/// Checked addition with context for the error message
#[inline]
pub fn add(a: u128, b: u128, context: &'static str) -> Result<u128> {
    a.checked_add(b).ok_or(MathError::Overflow(context))
}

/// Checked subtraction with context for the error message
#[inline]
pub fn sub(a: u128, b: u128, context: &'static str) -> Result<u128> {
    a.checked_sub(b).ok_or(MathError::Overflow(context))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_rounding_directions() {
        assert_eq!(mul_div(7, 3, 2, Rounding::Down).unwrap(), 10);
        assert_eq!(mul_div(7, 3, 2, Rounding::Up).unwrap(), 11);
        // exact division never rounds up
        assert_eq!(mul_div(8, 3, 2, Rounding::Up).unwrap(), 12);
    }

    #[test]
    fn test_mul_div_uses_wide_intermediate() {
        // a * b overflows u128, the quotient does not
        let a = u128::MAX / 2;
        assert_eq!(mul_div(a, 4, 8, Rounding::Down).unwrap(), a / 2);
    }

    #[test]
    fn test_mul_div_errors() {
        assert_eq!(
            mul_div(1, 1, 0, Rounding::Down),
            Err(MathError::DivisionByZero)
        );
        assert!(matches!(
            mul_div(u128::MAX, 2, 1, Rounding::Down),
            Err(MathError::Overflow(_))
        ));
    }

    #[test]
    fn test_apply_bps() {
        assert_eq!(apply_bps(1_000, 9_970, Rounding::Down).unwrap(), 997);
        assert_eq!(apply_bps(1, 30, Rounding::Down).unwrap(), 0);
        assert_eq!(apply_bps(1, 30, Rounding::Up).unwrap(), 1);
    }

    #[test]
    fn test_sqrt_product() {
        assert_eq!(sqrt_product(10_000, 40_000), 20_000);
        assert_eq!(sqrt_product(2, 1), 1);
        assert_eq!(sqrt_product(0, 5), 0);
        assert_eq!(sqrt_product(u128::MAX, u128::MAX), u128::MAX);
    }

    #[test]
    fn test_checked_helpers() {
        assert_eq!(add(1, 2, "add").unwrap(), 3);
        assert_eq!(sub(1, 2, "reserve"), Err(MathError::Overflow("reserve")));
    }
}
