//! Constant-product (`x * y = k`) pool math with exact integer results
//!
//! Integer counterpart of the usual Uniswap V2 formulas. Fees are taken from
//! the input before pricing and stay in the pool, so `k` never decreases.
//!
//! # Swap (exact input)
//!
//! 1. `amount_in_eff = floor(amount_in × (10 000 − fee_bps) / 10 000)`
//! 2. `amount_out = floor(amount_in_eff × R_out / (R_in + amount_in_eff))`
//!
//! Step 2 is the exact value of `R_out − R_in × R_out / (R_in + amount_in_eff)`
//! rounded down, so the pool never pays out a fractional unit it does not owe.

use crate::fixed_point::{
    self, div_wide, full_mul, mul_div, widen, MathError, Result, Rounding, BPS_DENOMINATOR,
};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Output of a constant-product swap calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub amount_in: u128,
    /// Input left after the fee is deducted
    pub amount_in_after_fee: u128,
    /// `amount_in - amount_in_after_fee`, retained by the pool
    pub fee: u128,
    pub amount_out: u128,
    /// Deviation of the execution price from the spot price, in basis points
    pub price_impact_bps: u32,
}

/// Constant-product math functions
pub struct ConstantProductMath;

impl ConstantProductMath {
    /// Input amount remaining after the fee, rounded down
    pub fn amount_in_after_fee(amount_in: u128, fee_bps: u32) -> Result<u128> {
        let fee_bps = fee_bps as u128;
        if fee_bps > BPS_DENOMINATOR {
            return Err(MathError::Overflow("fee above 100%"));
        }
        mul_div(
            amount_in,
            BPS_DENOMINATOR - fee_bps,
            BPS_DENOMINATOR,
            Rounding::Down,
        )
    }

    /// Output amount for an already fee-adjusted input
    ///
    /// # Arguments
    /// * `amount_in_eff` - Input after fee (in base units)
    /// * `reserve_in` - Reserve of the input token
    /// * `reserve_out` - Reserve of the output token
    pub fn amount_out(amount_in_eff: u128, reserve_in: u128, reserve_out: u128) -> Result<u128> {
        let denominator = fixed_point::add(reserve_in, amount_in_eff, "reserve_in + amount_in")?;
        mul_div(amount_in_eff, reserve_out, denominator, Rounding::Down)
    }

    /// Full exact-input quote: fee, output and price impact
    pub fn quote_exact_in(
        amount_in: u128,
        reserve_in: u128,
        reserve_out: u128,
        fee_bps: u32,
    ) -> Result<SwapQuote> {
        let amount_in_after_fee = Self::amount_in_after_fee(amount_in, fee_bps)?;
        let amount_out = Self::amount_out(amount_in_after_fee, reserve_in, reserve_out)?;
        let price_impact_bps =
            Self::price_impact_bps(amount_in, amount_out, reserve_in, reserve_out)?;

        Ok(SwapQuote {
            amount_in,
            amount_in_after_fee,
            fee: amount_in - amount_in_after_fee,
            amount_out,
            price_impact_bps,
        })
    }

    /// Price impact in basis points.
    ///
    /// Compares the execution price `amount_out / amount_in` with the spot price
    /// `reserve_out / reserve_in`: `10 000 × (1 − execution / spot)`. The ratio is
    /// rounded down, so the reported impact is never understated. Display only.
    pub fn price_impact_bps(
        amount_in: u128,
        amount_out: u128,
        reserve_in: u128,
        reserve_out: u128,
    ) -> Result<u32> {
        let execution_over_spot = full_mul(amount_out, reserve_in)
            .checked_mul(widen(BPS_DENOMINATOR))
            .ok_or(MathError::Overflow("price impact numerator"))?;
        let ratio_bps = div_wide(
            execution_over_spot,
            full_mul(amount_in, reserve_out),
            Rounding::Down,
        )?;
        let ratio_bps = ratio_bps.min(widen(BPS_DENOMINATOR)).low_u128();
        Ok((BPS_DENOMINATOR - ratio_bps) as u32)
    }

    /// Pool invariant `k = reserve_a × reserve_b` in 256 bits
    pub fn invariant(reserve_a: u128, reserve_b: u128) -> U256 {
        full_mul(reserve_a, reserve_b)
    }

    /// Amount of B matching `amount_a` at the current reserve ratio, rounded down
    pub fn quote_proportional(amount_a: u128, reserve_a: u128, reserve_b: u128) -> Result<u128> {
        mul_div(amount_a, reserve_b, reserve_a, Rounding::Down)
    }

    /// Choose deposit amounts that respect the current reserve ratio.
    ///
    /// Takes all of `desired_a` when the matching B fits inside `desired_b`,
    /// otherwise all of `desired_b` with the matching A.
    pub fn optimal_deposit(
        desired_a: u128,
        desired_b: u128,
        reserve_a: u128,
        reserve_b: u128,
    ) -> Result<(u128, u128)> {
        let optimal_b = Self::quote_proportional(desired_a, reserve_a, reserve_b)?;
        if optimal_b <= desired_b {
            return Ok((desired_a, optimal_b));
        }
        let optimal_a = Self::quote_proportional(desired_b, reserve_b, reserve_a)?;
        Ok((optimal_a.min(desired_a), desired_b))
    }

    /// LP shares for the first deposit, before the minimum-liquidity lock
    pub fn initial_shares(amount_a: u128, amount_b: u128) -> u128 {
        fixed_point::sqrt_product(amount_a, amount_b)
    }

    /// LP shares for a deposit into a funded pool: the smaller of the two
    /// proportional claims, rounded down
    pub fn shares_for_deposit(
        amount_a: u128,
        amount_b: u128,
        reserve_a: u128,
        reserve_b: u128,
        total_shares: u128,
    ) -> Result<u128> {
        let from_a = mul_div(amount_a, total_shares, reserve_a, Rounding::Down)?;
        let from_b = mul_div(amount_b, total_shares, reserve_b, Rounding::Down)?;
        Ok(from_a.min(from_b))
    }

    /// Token amounts released by burning `shares`, each rounded down
    pub fn amounts_for_shares(
        shares: u128,
        reserve_a: u128,
        reserve_b: u128,
        total_shares: u128,
    ) -> Result<(u128, u128)> {
        let amount_a = mul_div(shares, reserve_a, total_shares, Rounding::Down)?;
        let amount_b = mul_div(shares, reserve_b, total_shares, Rounding::Down)?;
        Ok((amount_a, amount_b))
    }
}
