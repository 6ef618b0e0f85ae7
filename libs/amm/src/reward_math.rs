//! Reward-per-share accrual math
//!
//! Rewards are distributed with a running accumulator instead of iterating
//! stakers: each second of emission raises `acc_reward_per_share` by
//! `emission / total_weight`, and a position earns
//! `weight × (acc − snapshot)` since its last checkpoint.
//!
//! The accumulator is scaled by [`ACC_REWARD_PRECISION`]. Both the increment
//! and the per-position payout round down, so the sum of payouts never exceeds
//! the emitted amount.

use crate::fixed_point::{self, div_wide, full_mul, mul_div, narrow, widen, MathError, Result, Rounding};

/// Scale applied to `acc_reward_per_share`
pub const ACC_REWARD_PRECISION: u128 = 1_000_000_000_000;

/// Multiplier of 1.0x expressed in basis points
pub const MULTIPLIER_BASE_BPS: u32 = 10_000;

/// Reward accrual math functions
pub struct RewardMath;

impl RewardMath {
    /// Total emission over `elapsed` seconds: `elapsed × reward_per_second × pool_weight`
    pub fn emission(elapsed: u64, reward_per_second: u128, pool_weight: u32) -> Result<u128> {
        let per_second = full_mul(reward_per_second, pool_weight as u128);
        let total = per_second
            .checked_mul(widen(elapsed as u128))
            .ok_or(MathError::Overflow("emission"))?;
        narrow(total, "emission")
    }

    /// Accumulator increment for `elapsed` seconds spread over `total_weight`
    ///
    /// `elapsed × reward_per_second × pool_weight × PRECISION / total_weight`,
    /// rounded down.
    pub fn acc_increment(
        elapsed: u64,
        reward_per_second: u128,
        pool_weight: u32,
        total_weight: u128,
    ) -> Result<u128> {
        let emission = Self::emission(elapsed, reward_per_second, pool_weight)?;
        let scaled = full_mul(emission, ACC_REWARD_PRECISION);
        let increment = div_wide(scaled, widen(total_weight), Rounding::Down)?;
        narrow(increment, "acc_reward_per_share increment")
    }

    /// Rewards earned by `weight` since the accumulator stood at `reward_debt`
    pub fn pending(weight: u128, acc_reward_per_share: u128, reward_debt: u128) -> Result<u128> {
        let delta = fixed_point::sub(
            acc_reward_per_share,
            reward_debt,
            "reward debt ahead of accumulator",
        )?;
        mul_div(weight, delta, ACC_REWARD_PRECISION, Rounding::Down)
    }

    /// Staked weight after applying a lock multiplier, rounded down
    pub fn weighted_stake(amount: u128, multiplier_bps: u32) -> Result<u128> {
        mul_div(
            amount,
            multiplier_bps as u128,
            MULTIPLIER_BASE_BPS as u128,
            Rounding::Down,
        )
    }
}
