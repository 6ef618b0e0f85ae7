//! Liquidity Accountant
//!
//! Mints LP shares for deposits and burns them for withdrawals, always in
//! proportion to the reserves held at the moment of the action. Reward
//! checkpoints are taken before any share balance changes.

use crate::error::{EngineError, Result};
use crate::ledger::{Pool, PoolDelta, PoolShard};
use crate::rewards::RewardEmitter;
use amm::ConstantProductMath;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use types::{PoolId, UserAddress};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityRequest {
    pub user: UserAddress,
    pub pool_id: PoolId,
    pub amount_a_desired: u128,
    pub amount_b_desired: u128,
    pub amount_a_min: u128,
    pub amount_b_min: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityReceipt {
    pub pool_id: PoolId,
    pub user: UserAddress,
    pub lp_minted: u128,
    pub amount_a_used: u128,
    pub amount_b_used: u128,
    /// Shares locked forever by a pool's first deposit, zero otherwise
    pub locked_liquidity: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityReceipt {
    pub pool_id: PoolId,
    pub user: UserAddress,
    pub lp_burned: u128,
    pub amount_a: u128,
    pub amount_b: u128,
}

/// Amounts a deposit would use and the shares it would mint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositPlan {
    pub lp_minted: u128,
    pub amount_a: u128,
    pub amount_b: u128,
    pub locked_liquidity: u128,
}

pub struct LiquidityAccountant;

impl LiquidityAccountant {
    /// Work out a deposit against the pool's current state without applying it
    pub fn plan_deposit(
        pool: &Pool,
        amount_a_desired: u128,
        amount_b_desired: u128,
        minimum_liquidity: u128,
    ) -> Result<DepositPlan> {
        if amount_a_desired == 0 || amount_b_desired == 0 {
            return Err(EngineError::InvalidAmount("both deposit amounts must be positive"));
        }

        if pool.is_empty() {
            let shares = ConstantProductMath::initial_shares(amount_a_desired, amount_b_desired);
            if shares <= minimum_liquidity {
                return Err(EngineError::InsufficientLiquidity {
                    pool_id: pool.id,
                    reason: "initial deposit below minimum liquidity",
                });
            }
            return Ok(DepositPlan {
                lp_minted: shares - minimum_liquidity,
                amount_a: amount_a_desired,
                amount_b: amount_b_desired,
                locked_liquidity: minimum_liquidity,
            });
        }

        let (amount_a, amount_b) = ConstantProductMath::optimal_deposit(
            amount_a_desired,
            amount_b_desired,
            pool.reserve_a,
            pool.reserve_b,
        )?;
        let lp_minted = ConstantProductMath::shares_for_deposit(
            amount_a,
            amount_b,
            pool.reserve_a,
            pool.reserve_b,
            pool.total_lp_supply,
        )?;
        if lp_minted == 0 {
            return Err(EngineError::InsufficientLiquidity {
                pool_id: pool.id,
                reason: "deposit too small to mint shares",
            });
        }
        Ok(DepositPlan {
            lp_minted,
            amount_a,
            amount_b,
            locked_liquidity: 0,
        })
    }

    /// Token amounts released by burning `lp_amount` shares
    pub fn preview_remove(pool: &Pool, lp_amount: u128) -> Result<(u128, u128)> {
        if lp_amount == 0 {
            return Err(EngineError::InvalidAmount("lp amount must be positive"));
        }
        if lp_amount > pool.total_lp_supply {
            return Err(EngineError::InsufficientShares {
                requested: lp_amount,
                available: pool.total_lp_supply,
            });
        }
        Ok(ConstantProductMath::amounts_for_shares(
            lp_amount,
            pool.reserve_a,
            pool.reserve_b,
            pool.total_lp_supply,
        )?)
    }

    pub fn add(
        shard: &mut PoolShard,
        request: &AddLiquidityRequest,
        minimum_liquidity: u128,
        now: u64,
    ) -> Result<AddLiquidityReceipt> {
        if request.user == UserAddress::ZERO {
            return Err(EngineError::InvalidUser);
        }

        let plan = Self::plan_deposit(
            &shard.pool,
            request.amount_a_desired,
            request.amount_b_desired,
            minimum_liquidity,
        )?;
        if plan.amount_a < request.amount_a_min {
            return Err(EngineError::SlippageExceeded {
                minimum: request.amount_a_min,
                actual: plan.amount_a,
            });
        }
        if plan.amount_b < request.amount_b_min {
            return Err(EngineError::SlippageExceeded {
                minimum: request.amount_b_min,
                actual: plan.amount_b,
            });
        }

        let (mut position, farm) = RewardEmitter::checkpoint(shard, &request.user, now)?;
        position.lp_balance = position
            .lp_balance
            .checked_add(plan.lp_minted)
            .ok_or(EngineError::Overflow("lp_balance"))?;

        let mut locked = None;
        if plan.locked_liquidity > 0 {
            let mut burn_position = shard.positions.load(&UserAddress::ZERO);
            burn_position.lp_balance = burn_position
                .lp_balance
                .checked_add(plan.locked_liquidity)
                .ok_or(EngineError::Overflow("locked liquidity"))?;
            locked = Some(burn_position);
        }

        let total_minted = plan
            .lp_minted
            .checked_add(plan.locked_liquidity)
            .ok_or(EngineError::Overflow("lp minted"))?;
        shard.apply_delta(&PoolDelta {
            reserve_a: PoolDelta::signed(plan.amount_a, "deposit amount a")?,
            reserve_b: PoolDelta::signed(plan.amount_b, "deposit amount b")?,
            lp_supply: PoolDelta::signed(total_minted, "lp minted")?,
            ..PoolDelta::default()
        })?;

        if let Some(farm) = farm {
            farm.commit(shard);
        }
        shard.positions.store(request.user, position);
        if let Some(burn_position) = locked {
            info!(
                pool_id = %shard.pool.id,
                locked = plan.locked_liquidity,
                "initial liquidity provided, minimum liquidity locked"
            );
            shard.positions.store(UserAddress::ZERO, burn_position);
        }

        debug!(
            pool_id = %shard.pool.id,
            user = %request.user.short(),
            lp_minted = plan.lp_minted,
            amount_a = plan.amount_a,
            amount_b = plan.amount_b,
            "liquidity added"
        );

        Ok(AddLiquidityReceipt {
            pool_id: shard.pool.id,
            user: request.user,
            lp_minted: plan.lp_minted,
            amount_a_used: plan.amount_a,
            amount_b_used: plan.amount_b,
            locked_liquidity: plan.locked_liquidity,
        })
    }

    /// Burn free (unstaked) shares for their share of both reserves
    pub fn remove(
        shard: &mut PoolShard,
        user: UserAddress,
        lp_amount: u128,
        amount_a_min: u128,
        amount_b_min: u128,
        now: u64,
    ) -> Result<RemoveLiquidityReceipt> {
        if user == UserAddress::ZERO {
            return Err(EngineError::InvalidUser);
        }
        if lp_amount == 0 {
            return Err(EngineError::InvalidAmount("lp amount must be positive"));
        }

        let available = shard.positions.load(&user).free_balance();
        if lp_amount > available {
            return Err(EngineError::InsufficientShares {
                requested: lp_amount,
                available,
            });
        }

        let (amount_a, amount_b) = Self::preview_remove(&shard.pool, lp_amount)?;
        if amount_a == 0 && amount_b == 0 {
            return Err(EngineError::InsufficientLiquidity {
                pool_id: shard.pool.id,
                reason: "burn too small to release tokens",
            });
        }
        if amount_a < amount_a_min {
            return Err(EngineError::SlippageExceeded {
                minimum: amount_a_min,
                actual: amount_a,
            });
        }
        if amount_b < amount_b_min {
            return Err(EngineError::SlippageExceeded {
                minimum: amount_b_min,
                actual: amount_b,
            });
        }

        let (mut position, farm) = RewardEmitter::checkpoint(shard, &user, now)?;
        position.lp_balance -= lp_amount;

        shard.apply_delta(&PoolDelta {
            reserve_a: -PoolDelta::signed(amount_a, "withdrawal amount a")?,
            reserve_b: -PoolDelta::signed(amount_b, "withdrawal amount b")?,
            lp_supply: -PoolDelta::signed(lp_amount, "lp burned")?,
            ..PoolDelta::default()
        })?;

        if let Some(farm) = farm {
            farm.commit(shard);
        }
        shard.positions.store(user, position);

        debug!(
            pool_id = %shard.pool.id,
            user = %user.short(),
            lp_burned = lp_amount,
            amount_a,
            amount_b,
            "liquidity removed"
        );

        Ok(RemoveLiquidityReceipt {
            pool_id: shard.pool.id,
            user,
            lp_burned: lp_amount,
            amount_a,
            amount_b,
        })
    }
}
