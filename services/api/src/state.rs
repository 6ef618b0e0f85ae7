//! Service state
//!
//! Owns the engine and the token registry, and translates wire requests into
//! engine calls: decimal strings become base units, percentages become
//! minimum-amount bounds, receipts become views. Every method here is
//! synchronous; handlers run them on the blocking pool.

use crate::dto::*;
use crate::error::{ApiError, Result};
use crate::registry::TokenRegistry;
use amm::fixed_point::mul_div;
use amm::Rounding;
use anyhow::Context;
use engine_config::service::server::DEFAULT_SWAP_DEADLINE_SECS;
use engine_config::service::time::SECONDS_PER_YEAR;
use engine_config::ServiceConfig;
use pool_engine::{
    AddLiquidityRequest, Clock, EngineError, EngineSnapshot, EventSink, PoolEngine, PoolSummary,
    RewardSchedule, StakeReceipt, SwapRequest,
};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use types::precision::{format_units, parse_units, percent_to_ppm, PERCENT_PPM_SCALE};
use types::{FarmId, PoolId, TokenAddress, UserAddress};

/// Slippage applied when a request does not carry one (percent)
pub const DEFAULT_SLIPPAGE: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

const DEFAULT_PAUSE_REASON: &str = "operator request";

pub struct ApiState {
    engine: PoolEngine,
    tokens: TokenRegistry,
}

impl ApiState {
    pub fn new(engine: PoolEngine, tokens: TokenRegistry) -> Self {
        Self { engine, tokens }
    }

    /// Restore from the configured state file when present, otherwise create
    /// the configured pools and farms
    pub fn from_config(
        config: &ServiceConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> anyhow::Result<Self> {
        let tokens = TokenRegistry::new(&config.tokens);

        let engine = match config.state_file.as_deref().filter(|path| path.exists()) {
            Some(path) => {
                let snapshot = EngineSnapshot::load(path)
                    .with_context(|| format!("failed to read state file {}", path.display()))?;
                PoolEngine::restore(snapshot, config.engine.clone(), clock, sink)
                    .context("failed to restore engine state")?
            }
            None => {
                let engine = PoolEngine::new(config.engine.clone(), clock, sink);
                bootstrap(&engine, config)?;
                engine
            }
        };

        let state = Self::new(engine, tokens);
        state.check_registered_tokens()?;
        Ok(state)
    }

    pub fn engine(&self) -> &PoolEngine {
        &self.engine
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn save_snapshot(&self, path: &Path) -> anyhow::Result<()> {
        let snapshot = self.engine.snapshot().context("failed to snapshot engine")?;
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        snapshot
            .save(path)
            .with_context(|| format!("failed to write state file {}", path.display()))
    }

    /// Every pool and reward token must be registered so amounts can be converted
    fn check_registered_tokens(&self) -> anyhow::Result<()> {
        for pool_id in self.engine.list_pools() {
            let pool = self.engine.pool(pool_id)?;
            for token in [pool.token_a, pool.token_b] {
                self.tokens
                    .get(&token)
                    .with_context(|| format!("{pool_id} uses unregistered token {token}"))?;
            }
        }
        for farm_id in self.engine.farm_ids() {
            let farm = self.engine.farm(farm_id)?;
            self.tokens.get(&farm.reward_token).with_context(|| {
                format!("{farm_id} pays unregistered token {}", farm.reward_token)
            })?;
        }
        Ok(())
    }

    // ---- pools ----

    pub fn list_pools(&self, user: Option<&UserAddress>) -> Result<Vec<PoolView>> {
        self.engine
            .list_pools()
            .into_iter()
            .map(|pool_id| self.pool_view(pool_id, user))
            .collect()
    }

    pub fn pool_view(&self, pool_id: PoolId, user: Option<&UserAddress>) -> Result<PoolView> {
        let summary = self.engine.pool_summary(pool_id, user)?;
        let PoolSummary {
            pool,
            farm,
            stats_24h,
            user_position,
            ..
        } = summary;
        let lp_decimals = self.tokens.lp_decimals(&pool.token_a, &pool.token_b)?;

        let tvl = self.pair_value(
            (&pool.token_a, pool.reserve_a),
            (&pool.token_b, pool.reserve_b),
        );
        let volume = self.pair_value(
            (&pool.token_a, stats_24h.volume_a),
            (&pool.token_b, stats_24h.volume_b),
        );
        let fees = self.pair_value(
            (&pool.token_a, stats_24h.fees_a),
            (&pool.token_b, stats_24h.fees_b),
        );
        let now = self.engine.now();
        let apr = match (&farm, tvl) {
            (Some(farm), Some(tvl)) => self.farm_apr(farm, tvl, now),
            _ => None,
        };
        let farm = farm
            .map(|farm| self.farm_view(&farm, lp_decimals, now))
            .transpose()?;

        Ok(PoolView {
            id: pool.id,
            token_a: self.token_view(&pool.token_a)?,
            token_b: self.token_view(&pool.token_b)?,
            tvl: tvl.map(usd),
            apr: apr.map(usd),
            volume24h: volume.map(usd),
            fees24h: fees.map(usd),
            user_liquidity: format_units(
                user_position.map(|p| p.lp_balance).unwrap_or(0),
                lp_decimals,
            ),
            reserve_a: self.tokens.format_amount(&pool.token_a, pool.reserve_a)?,
            reserve_b: self.tokens.format_amount(&pool.token_b, pool.reserve_b)?,
            lp_tokens: format_units(pool.total_lp_supply, lp_decimals),
            fee_rate: bps_to_percent(pool.fee_bps),
            paused: pool.paused,
            farm,
        })
    }

    pub fn pause_pool(&self, pool_id: PoolId, reason: Option<&str>) -> Result<PauseView> {
        let changed = self
            .engine
            .pause_pool(pool_id, reason.unwrap_or(DEFAULT_PAUSE_REASON))?;
        Ok(PauseView {
            pool_id,
            paused: true,
            changed,
        })
    }

    pub fn resume_pool(&self, pool_id: PoolId) -> Result<PauseView> {
        let changed = self.engine.resume_pool(pool_id)?;
        Ok(PauseView {
            pool_id,
            paused: false,
            changed,
        })
    }

    // ---- liquidity ----

    pub fn add_liquidity(&self, body: AddLiquidityBody) -> Result<AddLiquidityView> {
        let pool = self.engine.pool(body.pool_id)?;
        let amount_a = self
            .tokens
            .parse_amount(&pool.token_a, &body.amount_a, "amountA")?;
        let amount_b = self
            .tokens
            .parse_amount(&pool.token_b, &body.amount_b, "amountB")?;

        let receipt = self.engine.add_liquidity(&AddLiquidityRequest {
            user: body.user_address,
            pool_id: body.pool_id,
            amount_a_desired: amount_a,
            amount_b_desired: amount_b,
            amount_a_min: slippage_floor(amount_a, body.slippage)?,
            amount_b_min: slippage_floor(amount_b, body.slippage)?,
        })?;

        let lp_decimals = self.tokens.lp_decimals(&pool.token_a, &pool.token_b)?;
        Ok(AddLiquidityView {
            lp_minted: format_units(receipt.lp_minted, lp_decimals),
            amount_a_used: self.tokens.format_amount(&pool.token_a, receipt.amount_a_used)?,
            amount_b_used: self.tokens.format_amount(&pool.token_b, receipt.amount_b_used)?,
        })
    }

    /// Burn `percentage` of the caller's unstaked shares
    pub fn remove_liquidity(&self, body: RemoveLiquidityBody) -> Result<RemoveLiquidityView> {
        let pool = self.engine.pool(body.pool_id)?;
        let share_ppm =
            percent_to_ppm(body.percentage).map_err(ApiError::precision("percentage"))?;
        if share_ppm == 0 {
            return Err(ApiError::BadRequest("percentage must be positive".to_string()));
        }

        let free = self
            .engine
            .position(&body.user_address, body.pool_id)?
            .map(|position| position.free_balance())
            .unwrap_or(0);
        let lp_amount = mul_div(free, share_ppm, PERCENT_PPM_SCALE, Rounding::Down)
            .map_err(EngineError::from)?;
        if lp_amount == 0 {
            return Err(EngineError::InsufficientShares {
                requested: lp_amount,
                available: free,
            }
            .into());
        }

        let (amount_a_min, amount_b_min) = match body.slippage {
            Some(slippage) => {
                let (expected_a, expected_b) =
                    self.engine.preview_remove_liquidity(body.pool_id, lp_amount)?;
                (
                    slippage_floor(expected_a, Some(slippage))?,
                    slippage_floor(expected_b, Some(slippage))?,
                )
            }
            None => (0, 0),
        };

        let receipt = self.engine.remove_liquidity(
            body.user_address,
            body.pool_id,
            lp_amount,
            amount_a_min,
            amount_b_min,
        )?;

        let lp_decimals = self.tokens.lp_decimals(&pool.token_a, &pool.token_b)?;
        Ok(RemoveLiquidityView {
            lp_burned: format_units(receipt.lp_burned, lp_decimals),
            amount_a: self.tokens.format_amount(&pool.token_a, receipt.amount_a)?,
            amount_b: self.tokens.format_amount(&pool.token_b, receipt.amount_b)?,
        })
    }

    // ---- farms ----

    pub fn stake(&self, body: StakeBody) -> Result<StakeView> {
        let (farm, lp_decimals) = self.farm_context(body.farm_id)?;
        let amount = parse_lp(&body.amount, lp_decimals)?;
        let receipt = self.engine.stake(
            body.user_address,
            body.farm_id,
            amount,
            body.lock_period.unwrap_or(0),
        )?;
        self.stake_view(&receipt, &farm, lp_decimals)
    }

    pub fn unstake(&self, body: StakeBody) -> Result<StakeView> {
        let (farm, lp_decimals) = self.farm_context(body.farm_id)?;
        let amount = parse_lp(&body.amount, lp_decimals)?;
        let receipt = self
            .engine
            .unstake(body.user_address, body.farm_id, amount)?;
        self.stake_view(&receipt, &farm, lp_decimals)
    }

    pub fn relock(&self, body: RelockBody) -> Result<StakeView> {
        let (farm, lp_decimals) = self.farm_context(body.farm_id)?;
        let receipt = self
            .engine
            .relock(body.user_address, body.farm_id, body.lock_period)?;
        self.stake_view(&receipt, &farm, lp_decimals)
    }

    pub fn claim(&self, body: ClaimBody) -> Result<ClaimView> {
        let receipt = self.engine.claim(body.user_address, body.farm_id)?;
        let reward = self.tokens.get(&receipt.reward_token)?;
        Ok(ClaimView {
            reward_amount: format_units(receipt.amount, reward.decimals),
            reward_token: reward.symbol.clone(),
        })
    }

    // ---- swaps ----

    pub fn quote(&self, body: QuoteBody) -> Result<QuoteView> {
        let pool = self.engine.pool(body.pool_id)?;
        let token_in = self.tokens.resolve(&body.token_in)?;
        let (_, _, a_in) = pool.oriented(&token_in.address)?;
        let token_out = self.tokens.get(&pool.other_token(a_in))?;
        let amount_in = self
            .tokens
            .parse_amount(&token_in.address, &body.amount_in, "amountIn")?;

        let quote = self
            .engine
            .quote(body.pool_id, token_in.address, amount_in)?;
        Ok(QuoteView {
            pool_id: body.pool_id,
            token_in: token_in.symbol.clone(),
            token_out: token_out.symbol.clone(),
            amount_in: format_units(quote.amount_in, token_in.decimals),
            amount_out: format_units(quote.amount_out, token_out.decimals),
            fee: format_units(quote.fee, token_in.decimals),
            price_impact: bps_to_percent(quote.price_impact_bps),
        })
    }

    pub fn swap(&self, body: SwapBody) -> Result<SwapView> {
        let pool = self.engine.pool(body.pool_id)?;
        let token_in = self.tokens.resolve(&body.token_in)?;
        let (_, _, a_in) = pool.oriented(&token_in.address)?;
        let token_out = self.tokens.get(&pool.other_token(a_in))?;
        let amount_in = self
            .tokens
            .parse_amount(&token_in.address, &body.amount_in, "amountIn")?;

        let min_amount_out = match &body.min_amount_out {
            Some(min) => self
                .tokens
                .parse_amount(&token_out.address, min, "minAmountOut")?,
            None => {
                let quote = self
                    .engine
                    .quote(body.pool_id, token_in.address, amount_in)?;
                slippage_floor(quote.amount_out, body.slippage)?
            }
        };
        let deadline = body
            .deadline
            .unwrap_or_else(|| self.engine.now().saturating_add(DEFAULT_SWAP_DEADLINE_SECS));

        let receipt = self.engine.execute_swap(&SwapRequest {
            user: body.user_address,
            pool_id: body.pool_id,
            token_in: token_in.address,
            amount_in,
            min_amount_out,
            deadline,
        })?;
        Ok(SwapView {
            pool_id: receipt.pool_id,
            token_in: token_in.symbol.clone(),
            token_out: token_out.symbol.clone(),
            amount_in: format_units(receipt.amount_in, token_in.decimals),
            amount_out: format_units(receipt.amount_out, token_out.decimals),
            fee: format_units(receipt.fee, token_in.decimals),
            price_impact: bps_to_percent(receipt.price_impact_bps),
            timestamp: receipt.timestamp,
        })
    }

    // ---- positions ----

    pub fn positions(&self, user: &UserAddress) -> Result<Vec<PositionView>> {
        let mut views = Vec::new();
        for (pool_id, position) in self.engine.positions_for_user(user)? {
            let summary = self.engine.pool_summary(pool_id, None)?;
            let pool = &summary.pool;
            let lp_decimals = self.tokens.lp_decimals(&pool.token_a, &pool.token_b)?;

            let (amount_a, amount_b) = if position.lp_balance == 0 {
                (0, 0)
            } else {
                self.engine
                    .preview_remove_liquidity(pool_id, position.lp_balance)?
            };

            let (farm_id, pending, reward_token) = match &summary.farm {
                Some(farm) => {
                    let pending = self.engine.pending_reward(user, farm.farm_id)?;
                    (Some(farm.farm_id), pending, Some(self.tokens.get(&farm.reward_token)?))
                }
                None => (None, 0, None),
            };
            let reward_decimals = reward_token.map(|token| token.decimals).unwrap_or(0);

            views.push(PositionView {
                pool_id,
                farm_id,
                lp_balance: format_units(position.lp_balance, lp_decimals),
                staked_balance: format_units(position.staked_balance, lp_decimals),
                free_balance: format_units(position.free_balance(), lp_decimals),
                amount_a: self.tokens.format_amount(&pool.token_a, amount_a)?,
                amount_b: self.tokens.format_amount(&pool.token_b, amount_b)?,
                lock_period: position.lock_days,
                multiplier: multiplier(position.multiplier_bps),
                lock_end: position.lock_end,
                pending_rewards: format_units(pending, reward_decimals),
                claimed_rewards: format_units(position.claimed_rewards, reward_decimals),
                reward_token: reward_token.map(|token| token.symbol.clone()),
            });
        }
        Ok(views)
    }

    pub fn status(&self) -> StatusView {
        let pools = self.engine.list_pools();
        let paused_pools = pools
            .iter()
            .filter(|pool_id| {
                self.engine
                    .pool(**pool_id)
                    .map(|pool| pool.paused)
                    .unwrap_or(false)
            })
            .count();
        StatusView {
            status: "running".to_string(),
            pools: pools.len(),
            paused_pools,
            farms: self.engine.farm_ids().len(),
            tokens: self.tokens.len(),
            timestamp: self.engine.now(),
        }
    }

    // ---- helpers ----

    fn token_view(&self, address: &TokenAddress) -> Result<TokenView> {
        let token = self.tokens.get(address)?;
        Ok(TokenView {
            symbol: token.symbol.clone(),
            address: token.address,
            decimals: token.decimals,
        })
    }

    fn farm_view(&self, farm: &RewardSchedule, lp_decimals: u8, now: u64) -> Result<FarmView> {
        Ok(FarmView {
            id: farm.farm_id,
            reward_token: self.token_view(&farm.reward_token)?,
            reward_per_second: self
                .tokens
                .format_amount(&farm.reward_token, farm.reward_per_second)?,
            pool_weight: farm.pool_weight,
            end_time: farm.end_time,
            total_staked: format_units(farm.total_staked, lp_decimals),
            active: farm.is_active(now),
        })
    }

    /// Farm and LP decimals for a stake-family request
    fn farm_context(&self, farm_id: FarmId) -> Result<(RewardSchedule, u8)> {
        let farm = self.engine.farm(farm_id)?;
        let pool = self.engine.pool(farm.pool_id)?;
        let lp_decimals = self.tokens.lp_decimals(&pool.token_a, &pool.token_b)?;
        Ok((farm, lp_decimals))
    }

    fn stake_view(
        &self,
        receipt: &StakeReceipt,
        farm: &RewardSchedule,
        lp_decimals: u8,
    ) -> Result<StakeView> {
        Ok(StakeView {
            farm_id: receipt.farm_id,
            pool_id: receipt.pool_id,
            user_address: receipt.user,
            amount: format_units(receipt.amount, lp_decimals),
            staked_balance: format_units(receipt.staked_balance, lp_decimals),
            lock_period: receipt.lock_days,
            multiplier: multiplier(receipt.multiplier_bps),
            lock_end: receipt.lock_end,
            settled_rewards: self
                .tokens
                .format_amount(&farm.reward_token, receipt.settled_rewards)?,
            timestamp: receipt.timestamp,
        })
    }

    /// USD value of two token amounts; `None` unless both are priced
    fn pair_value(&self, a: (&TokenAddress, u128), b: (&TokenAddress, u128)) -> Option<Decimal> {
        let value_a = self.tokens.usd_value(a.0, a.1)?;
        let value_b = self.tokens.usd_value(b.0, b.1)?;
        value_a.checked_add(value_b)
    }

    /// Yearly emission value over pool TVL, in percent
    fn farm_apr(&self, farm: &RewardSchedule, tvl: Decimal, now: u64) -> Option<Decimal> {
        if !farm.is_active(now) {
            return Some(Decimal::ZERO);
        }
        if tvl.is_zero() {
            return None;
        }
        let yearly = farm
            .emission_per_second()
            .ok()?
            .checked_mul(SECONDS_PER_YEAR as u128)?;
        let value = self.tokens.usd_value(&farm.reward_token, yearly)?;
        value
            .checked_div(tvl)?
            .checked_mul(Decimal::ONE_HUNDRED)
    }
}

/// Create the configured pools and their farms
fn bootstrap(engine: &PoolEngine, config: &ServiceConfig) -> anyhow::Result<()> {
    for pool_config in &config.pools {
        let token_a = config
            .token(&pool_config.token_a)
            .with_context(|| format!("unknown token {}", pool_config.token_a))?;
        let token_b = config
            .token(&pool_config.token_b)
            .with_context(|| format!("unknown token {}", pool_config.token_b))?;

        let pool_id = engine
            .create_pool(token_a.address, token_b.address, pool_config.fee_bps)
            .with_context(|| {
                format!("failed to create pool {}/{}", token_a.symbol, token_b.symbol)
            })?;

        let Some(farm_config) = &pool_config.farm else {
            continue;
        };
        let reward = config
            .token(&farm_config.reward_token)
            .with_context(|| format!("unknown reward token {}", farm_config.reward_token))?;
        let reward_per_second = parse_units(
            &farm_config.reward_per_second,
            reward.decimals,
        )
        .with_context(|| format!("invalid reward_per_second for {pool_id}"))?;

        let farm_id = engine
            .create_farm(
                pool_id,
                reward.address,
                reward_per_second,
                farm_config.pool_weight,
                farm_config.end_time,
            )
            .with_context(|| format!("failed to create farm for {pool_id}"))?;
        info!(%pool_id, %farm_id, reward = %reward.symbol, "bootstrapped farm");
    }

    if config.pools.is_empty() {
        warn!("no pools configured");
    }
    Ok(())
}

/// Lower bound after allowing `slippage` percent (default 0.5%)
fn slippage_floor(amount: u128, slippage: Option<Decimal>) -> Result<u128> {
    let ppm = percent_to_ppm(slippage.unwrap_or(DEFAULT_SLIPPAGE))
        .map_err(ApiError::precision("slippage"))?;
    Ok(mul_div(amount, PERCENT_PPM_SCALE - ppm, PERCENT_PPM_SCALE, Rounding::Down)
        .map_err(EngineError::from)?)
}

fn parse_lp(amount: &str, lp_decimals: u8) -> Result<u128> {
    parse_units(amount, lp_decimals).map_err(ApiError::precision("amount"))
}

fn bps_to_percent(bps: u32) -> String {
    Decimal::new(bps as i64, 2).normalize().to_string()
}

fn multiplier(bps: u32) -> String {
    Decimal::new(bps as i64, 4).normalize().to_string()
}

fn usd(value: Decimal) -> String {
    value.round_dp(2).normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_slippage_floor() {
        assert_eq!(slippage_floor(1_000_000, None).unwrap(), 995_000);
        assert_eq!(slippage_floor(1_000_000, Some(dec!(1))).unwrap(), 990_000);
        assert_eq!(slippage_floor(1_000_000, Some(dec!(100))).unwrap(), 0);
        assert_eq!(slippage_floor(999, Some(dec!(0))).unwrap(), 999);
        assert!(matches!(
            slippage_floor(1, Some(dec!(101))),
            Err(ApiError::Precision { field: "slippage", .. })
        ));
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(bps_to_percent(30), "0.3");
        assert_eq!(bps_to_percent(40), "0.4");
        assert_eq!(bps_to_percent(0), "0");
        assert_eq!(multiplier(10_000), "1");
        assert_eq!(multiplier(12_500), "1.25");
        assert_eq!(usd(dec!(1234.5678)), "1234.57");
    }
}
