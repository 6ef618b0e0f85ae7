//! # AMM Math Library - Exact Integer Pool Mathematics
//!
//! ## Purpose
//!
//! Deterministic arithmetic for the pool engine: constant-product swap pricing,
//! LP share minting and burning, and reward-per-share accrual. Every function is
//! pure, works on `u128` base units with 256-bit intermediates, and reports
//! overflow or division by zero as a [`MathError`] instead of wrapping or
//! returning zero.
//!
//! ## Integration Points
//!
//! - **Callers**: the pool engine's swap, liquidity and reward components
//! - **Rounding**: explicit per operation; amounts paid out of a pool round down
//! - **Precision**: no floating point anywhere in this crate
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`fixed_point`] | widening multiply-divide, basis points, integer square root |
//! | [`cp_math`] | `x * y = k` quotes, price impact, deposit ratios, share math |
//! | [`reward_math`] | emission, accumulator increments, pending rewards, lock weights |

pub mod cp_math;
pub mod fixed_point;
pub mod reward_math;

pub use cp_math::{ConstantProductMath, SwapQuote};
pub use fixed_point::{MathError, Rounding, BPS_DENOMINATOR};
pub use reward_math::{RewardMath, ACC_REWARD_PRECISION, MULTIPLIER_BASE_BPS};

/// 256-bit unsigned integer used for intermediates and invariants
pub use primitive_types::U256;
