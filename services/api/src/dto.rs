//! Wire types
//!
//! Field names are camelCase. Token amounts are decimal strings in whole token
//! units; percentages (slippage, removal share) accept a string or a number.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::{FarmId, PoolId, TokenAddress, UserAddress};

// ---- requests ----

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    pub user: Option<UserAddress>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLiquidityBody {
    pub pool_id: PoolId,
    pub amount_a: String,
    pub amount_b: String,
    #[serde(default)]
    pub slippage: Option<Decimal>,
    pub user_address: UserAddress,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveLiquidityBody {
    pub pool_id: PoolId,
    /// Share of the caller's unstaked LP balance to burn, 0-100
    pub percentage: Decimal,
    #[serde(default)]
    pub slippage: Option<Decimal>,
    pub user_address: UserAddress,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeBody {
    pub farm_id: FarmId,
    /// LP shares, in LP token units
    pub amount: String,
    #[serde(default)]
    pub lock_period: Option<u32>,
    pub user_address: UserAddress,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelockBody {
    pub farm_id: FarmId,
    pub lock_period: u32,
    pub user_address: UserAddress,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimBody {
    pub farm_id: FarmId,
    pub user_address: UserAddress,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBody {
    pub pool_id: PoolId,
    /// Symbol or `0x` address
    pub token_in: String,
    pub amount_in: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapBody {
    pub pool_id: PoolId,
    pub token_in: String,
    pub amount_in: String,
    /// Explicit bound; takes precedence over `slippage`
    #[serde(default)]
    pub min_amount_out: Option<String>,
    #[serde(default)]
    pub slippage: Option<Decimal>,
    /// Unix seconds
    #[serde(default)]
    pub deadline: Option<u64>,
    pub user_address: UserAddress,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PauseBody {
    #[serde(default)]
    pub reason: Option<String>,
}

// ---- responses ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenView {
    pub symbol: String,
    pub address: TokenAddress,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmView {
    pub id: FarmId,
    pub reward_token: TokenView,
    pub reward_per_second: String,
    pub pool_weight: u32,
    pub end_time: Option<u64>,
    pub total_staked: String,
    pub active: bool,
}

/// Pool listing entry. USD figures are `null` when a token has no display price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolView {
    pub id: PoolId,
    pub token_a: TokenView,
    pub token_b: TokenView,
    pub tvl: Option<String>,
    pub apr: Option<String>,
    pub volume24h: Option<String>,
    pub fees24h: Option<String>,
    pub user_liquidity: String,
    pub reserve_a: String,
    pub reserve_b: String,
    pub lp_tokens: String,
    /// Percent, e.g. `"0.3"`
    pub fee_rate: String,
    pub paused: bool,
    pub farm: Option<FarmView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLiquidityView {
    pub lp_minted: String,
    pub amount_a_used: String,
    pub amount_b_used: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveLiquidityView {
    pub lp_burned: String,
    pub amount_a: String,
    pub amount_b: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeView {
    pub farm_id: FarmId,
    pub pool_id: PoolId,
    pub user_address: UserAddress,
    pub amount: String,
    pub staked_balance: String,
    pub lock_period: u32,
    /// e.g. `"1.25"`
    pub multiplier: String,
    pub lock_end: u64,
    pub settled_rewards: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimView {
    pub reward_amount: String,
    pub reward_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteView {
    pub pool_id: PoolId,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: String,
    pub amount_out: String,
    pub fee: String,
    /// Percent
    pub price_impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapView {
    pub pool_id: PoolId,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: String,
    pub amount_out: String,
    pub fee: String,
    pub price_impact: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionView {
    pub pool_id: PoolId,
    pub farm_id: Option<FarmId>,
    pub lp_balance: String,
    pub staked_balance: String,
    pub free_balance: String,
    /// Underlying amounts of the whole LP balance at current reserves
    pub amount_a: String,
    pub amount_b: String,
    pub lock_period: u32,
    pub multiplier: String,
    pub lock_end: u64,
    pub pending_rewards: String,
    pub claimed_rewards: String,
    pub reward_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseView {
    pub pool_id: PoolId,
    pub paused: bool,
    /// False when the pool was already in the requested state
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub status: String,
    pub pools: usize,
    pub paused_pools: usize,
    pub farms: usize,
    pub tokens: usize,
    pub timestamp: u64,
}
