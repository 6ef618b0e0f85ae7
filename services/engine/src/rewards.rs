//! Reward Emitter
//!
//! Reward-per-share accounting for one farm per pool. The farm's accumulator
//! advances with time in proportion to `reward_per_second × pool_weight`
//! divided by the total weighted stake; each position remembers the
//! accumulator value at its last checkpoint (`reward_debt`).
//!
//! A lock multiplier only boosts a position until its `lock_end`. The farm
//! keeps boosted positions ordered by lock end, and every advance of the
//! accumulator stops at each lock end on the way to settle that position at
//! its boosted weight before dropping it back to the base multiplier.
//!
//! Operations work on a [`FarmUpdate`] holding copies of the schedule and of
//! every position they touch, and write it back only once every step has
//! succeeded.

use crate::error::{EngineError, Result};
use crate::ledger::PoolShard;
use crate::positions::LpPosition;
use amm::{RewardMath, MULTIPLIER_BASE_BPS};
use engine_config::LockTierConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;
use types::{FarmId, PoolId, TokenAddress, UserAddress};

/// Emission schedule and accumulator of a farm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSchedule {
    pub farm_id: FarmId,
    pub pool_id: PoolId,
    pub reward_token: TokenAddress,
    /// Reward base units per second, per unit of pool weight
    pub reward_per_second: u128,
    pub pool_weight: u32,
    /// Scaled by `ACC_REWARD_PRECISION`; never decreases
    pub acc_reward_per_share: u128,
    pub last_accrual_time: u64,
    /// Emission stops at this timestamp
    pub end_time: Option<u64>,
    /// Sum of the weighted stakes of all positions
    pub total_weighted_stake: u128,
    /// Sum of raw staked LP shares
    pub total_staked: u128,
    /// Emission credited to stakers so far
    pub total_emitted: u128,
    pub total_claimed: u128,
    /// `(lock_end, user)` of every staked position above the base multiplier
    pub lock_expiries: BTreeSet<(u64, UserAddress)>,
}

impl RewardSchedule {
    pub fn new(
        farm_id: FarmId,
        pool_id: PoolId,
        reward_token: TokenAddress,
        reward_per_second: u128,
        pool_weight: u32,
        end_time: Option<u64>,
        now: u64,
    ) -> Self {
        Self {
            farm_id,
            pool_id,
            reward_token,
            reward_per_second,
            pool_weight,
            acc_reward_per_share: 0,
            last_accrual_time: now,
            end_time,
            total_weighted_stake: 0,
            total_staked: 0,
            total_emitted: 0,
            total_claimed: 0,
            lock_expiries: BTreeSet::new(),
        }
    }

    /// Emitting rewards at `now`
    pub fn is_active(&self, now: u64) -> bool {
        self.reward_per_second > 0 && self.end_time.map_or(true, |end| now < end)
    }

    /// Reward units emitted per second while active
    pub fn emission_per_second(&self) -> Result<u128> {
        Ok(RewardMath::emission(1, self.reward_per_second, self.pool_weight)?)
    }

    /// Advance the accumulator to `now` (capped at `end_time`).
    ///
    /// With nobody staked only the timestamp moves, so no rewards are
    /// emitted into an empty farm. Lock expiries are not handled here; see
    /// [`RewardEmitter`].
    pub fn accrue(&mut self, now: u64) -> Result<()> {
        let until = self.end_time.map_or(now, |end| now.min(end));
        if until <= self.last_accrual_time {
            return Ok(());
        }
        let elapsed = until - self.last_accrual_time;

        if self.total_weighted_stake == 0 || self.reward_per_second == 0 {
            self.last_accrual_time = until;
            return Ok(());
        }

        let increment = RewardMath::acc_increment(
            elapsed,
            self.reward_per_second,
            self.pool_weight,
            self.total_weighted_stake,
        )?;
        let emitted = RewardMath::emission(elapsed, self.reward_per_second, self.pool_weight)?;

        let acc = self
            .acc_reward_per_share
            .checked_add(increment)
            .ok_or(EngineError::Overflow("acc_reward_per_share"))?;
        let total_emitted = self
            .total_emitted
            .checked_add(emitted)
            .ok_or(EngineError::Overflow("total_emitted"))?;

        self.acc_reward_per_share = acc;
        self.total_emitted = total_emitted;
        self.last_accrual_time = until;
        Ok(())
    }

    /// Rewards earned by `position` since its last checkpoint
    pub fn pending(&self, position: &LpPosition) -> Result<u128> {
        Ok(RewardMath::pending(
            position.weighted_stake,
            self.acc_reward_per_share,
            position.reward_debt,
        )?)
    }

    /// Move pending rewards into the position's unclaimed counter and reset
    /// its checkpoint. Returns the settled amount.
    pub fn settle(&self, position: &mut LpPosition) -> Result<u128> {
        let pending = self.pending(position)?;
        position.unclaimed_rewards = position
            .unclaimed_rewards
            .checked_add(pending)
            .ok_or(EngineError::Overflow("unclaimed_rewards"))?;
        position.reward_debt = self.acc_reward_per_share;
        Ok(pending)
    }

    /// Set the position's staked balance and multiplier, keeping the farm
    /// totals in step
    fn reweight(
        &mut self,
        position: &mut LpPosition,
        staked: u128,
        multiplier_bps: u32,
    ) -> Result<()> {
        let weighted = RewardMath::weighted_stake(staked, multiplier_bps)?;
        let violated = |reason: &str| EngineError::InvariantViolated {
            pool_id: self.pool_id,
            reason: reason.to_string(),
        };

        let total_weighted = self
            .total_weighted_stake
            .checked_sub(position.weighted_stake)
            .ok_or_else(|| violated("weighted stake exceeds farm total"))?
            .checked_add(weighted)
            .ok_or(EngineError::Overflow("total_weighted_stake"))?;
        let total_staked = self
            .total_staked
            .checked_sub(position.staked_balance)
            .ok_or_else(|| violated("staked balance exceeds farm total"))?
            .checked_add(staked)
            .ok_or(EngineError::Overflow("total_staked"))?;

        self.total_weighted_stake = total_weighted;
        self.total_staked = total_staked;
        position.staked_balance = staked;
        position.weighted_stake = weighted;
        position.multiplier_bps = multiplier_bps;
        Ok(())
    }

    /// Re-key the user's expiry entry after its lock changed from
    /// `previous_end`
    fn track_lock(&mut self, user: UserAddress, previous_end: u64, position: &LpPosition) {
        self.lock_expiries.remove(&(previous_end, user));
        if position.staked_balance > 0 && position.multiplier_bps != MULTIPLIER_BASE_BPS {
            self.lock_expiries.insert((position.lock_end, user));
        }
    }
}

/// Farm copy and touched positions of an operation in progress
#[derive(Debug)]
pub struct FarmUpdate {
    farm: RewardSchedule,
    positions: Vec<(UserAddress, LpPosition)>,
}

impl FarmUpdate {
    fn get(&self, shard: &PoolShard, user: &UserAddress) -> Option<LpPosition> {
        self.positions
            .iter()
            .find(|(owner, _)| owner == user)
            .map(|(_, position)| position.clone())
            .or_else(|| shard.positions.get(user).cloned())
    }

    fn load(&self, shard: &PoolShard, user: &UserAddress) -> LpPosition {
        self.get(shard, user).unwrap_or_default()
    }

    fn put(&mut self, user: UserAddress, position: LpPosition) {
        match self.positions.iter_mut().find(|(owner, _)| *owner == user) {
            Some(slot) => slot.1 = position,
            None => self.positions.push((user, position)),
        }
    }

    /// Write the farm and every touched position back to the shard
    pub fn commit(self, shard: &mut PoolShard) {
        for (user, position) in self.positions {
            shard.positions.store(user, position);
        }
        shard.farm = Some(self.farm);
    }
}

/// Result of a stake, unstake or relock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeReceipt {
    pub farm_id: FarmId,
    pub pool_id: PoolId,
    pub user: UserAddress,
    /// Shares moved by this operation (zero for a relock)
    pub amount: u128,
    pub staked_balance: u128,
    pub weighted_stake: u128,
    pub lock_days: u32,
    pub multiplier_bps: u32,
    pub lock_end: u64,
    /// Pending rewards moved to the unclaimed counter by this operation
    pub settled_rewards: u128,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub farm_id: FarmId,
    pub user: UserAddress,
    pub reward_token: TokenAddress,
    pub amount: u128,
    pub timestamp: u64,
}

/// Farm-level operations on a locked pool shard
pub struct RewardEmitter;

impl RewardEmitter {
    fn farm(shard: &PoolShard, farm_id: FarmId) -> Result<&RewardSchedule> {
        match &shard.farm {
            Some(farm) if farm.farm_id == farm_id => Ok(farm),
            _ => Err(EngineError::FarmNotFound(farm_id)),
        }
    }

    fn receipt(
        farm: &RewardSchedule,
        user: UserAddress,
        amount: u128,
        position: &LpPosition,
        settled_rewards: u128,
        now: u64,
    ) -> StakeReceipt {
        StakeReceipt {
            farm_id: farm.farm_id,
            pool_id: farm.pool_id,
            user,
            amount,
            staked_balance: position.staked_balance,
            weighted_stake: position.weighted_stake,
            lock_days: position.lock_days,
            multiplier_bps: position.multiplier_bps,
            lock_end: position.lock_end,
            settled_rewards,
            timestamp: now,
        }
    }

    /// Copy of `farm` advanced to `now`, expiring every lock that ends on the
    /// way at its own lock end
    fn advance(shard: &PoolShard, farm: &RewardSchedule, now: u64) -> Result<FarmUpdate> {
        let mut update = FarmUpdate {
            farm: farm.clone(),
            positions: Vec::new(),
        };
        while let Some(&(lock_end, user)) = update.farm.lock_expiries.first() {
            if lock_end > now {
                break;
            }
            update.farm.lock_expiries.remove(&(lock_end, user));
            update.farm.accrue(lock_end)?;

            let mut position = update.load(shard, &user);
            update.farm.settle(&mut position)?;
            let staked = position.staked_balance;
            update
                .farm
                .reweight(&mut position, staked, MULTIPLIER_BASE_BPS)?;
            position.lock_days = 0;
            debug!(farm_id = %farm.farm_id, user = %user.short(), lock_end, "lock expired");
            update.put(user, position);
        }
        update.farm.accrue(now)?;
        Ok(update)
    }

    fn open(shard: &PoolShard, farm_id: FarmId, now: u64) -> Result<FarmUpdate> {
        let farm = Self::farm(shard, farm_id)?;
        Self::advance(shard, farm, now)
    }

    /// Advance the pool's farm, if it has one
    pub fn accrue(shard: &mut PoolShard, now: u64) -> Result<()> {
        let update = match &shard.farm {
            Some(farm) => Self::advance(shard, farm, now)?,
            None => return Ok(()),
        };
        update.commit(shard);
        Ok(())
    }

    /// Bring a position's reward checkpoint up to date before its share
    /// balances change.
    ///
    /// Returns the settled position and, when the pool has a farm, the
    /// pending farm update. Commit the update before storing the position.
    pub fn checkpoint(
        shard: &PoolShard,
        user: &UserAddress,
        now: u64,
    ) -> Result<(LpPosition, Option<FarmUpdate>)> {
        match &shard.farm {
            Some(farm) => {
                let update = Self::advance(shard, farm, now)?;
                let mut position = update.load(shard, user);
                update.farm.settle(&mut position)?;
                Ok((position, Some(update)))
            }
            None => Ok((shard.positions.load(user), None)),
        }
    }

    /// Change the emission rate, accruing at the old rate first
    pub fn set_reward_rate(
        shard: &mut PoolShard,
        farm_id: FarmId,
        reward_per_second: u128,
        now: u64,
    ) -> Result<RewardSchedule> {
        let mut update = Self::open(shard, farm_id, now)?;
        update.farm.reward_per_second = reward_per_second;
        let farm = update.farm.clone();
        update.commit(shard);
        Ok(farm)
    }

    /// Stake free LP shares.
    ///
    /// The whole staked balance moves to `tier`: its multiplier applies from
    /// now on and the lock ends at the later of the current lock end and
    /// `now + tier length`.
    pub fn stake(
        shard: &mut PoolShard,
        farm_id: FarmId,
        user: UserAddress,
        amount: u128,
        tier: LockTierConfig,
        now: u64,
    ) -> Result<StakeReceipt> {
        if user == UserAddress::ZERO {
            return Err(EngineError::InvalidUser);
        }
        if amount == 0 {
            return Err(EngineError::InvalidAmount("stake amount must be positive"));
        }

        let mut update = Self::open(shard, farm_id, now)?;
        let mut position = update.load(shard, &user);
        let available = position.free_balance();
        if amount > available {
            return Err(EngineError::InsufficientShares {
                requested: amount,
                available,
            });
        }

        let settled = update.farm.settle(&mut position)?;
        let staked = position
            .staked_balance
            .checked_add(amount)
            .ok_or(EngineError::Overflow("staked_balance"))?;
        let previous_end = position.lock_end;
        let lock_end = now
            .checked_add(tier.duration_secs())
            .ok_or(EngineError::Overflow("lock_end"))?
            .max(previous_end);
        update.farm.reweight(&mut position, staked, tier.multiplier_bps)?;
        position.lock_days = tier.days;
        position.lock_end = lock_end;
        update.farm.track_lock(user, previous_end, &position);

        let receipt = Self::receipt(&update.farm, user, amount, &position, settled, now);
        debug!(%farm_id, user = %user.short(), amount, lock_days = tier.days, "staked");
        update.put(user, position);
        update.commit(shard);
        Ok(receipt)
    }

    /// Withdraw staked shares back to the free balance once the lock has ended
    pub fn unstake(
        shard: &mut PoolShard,
        farm_id: FarmId,
        user: UserAddress,
        amount: u128,
        now: u64,
    ) -> Result<StakeReceipt> {
        if amount == 0 {
            return Err(EngineError::InvalidAmount("unstake amount must be positive"));
        }

        let mut update = Self::open(shard, farm_id, now)?;
        let mut position = update.load(shard, &user);
        if amount > position.staked_balance {
            return Err(EngineError::InsufficientShares {
                requested: amount,
                available: position.staked_balance,
            });
        }
        if position.is_locked_at(now) {
            return Err(EngineError::LockActive {
                lock_end: position.lock_end,
                now,
            });
        }

        let settled = update.farm.settle(&mut position)?;
        let staked = position.staked_balance - amount;
        let multiplier = if staked == 0 {
            MULTIPLIER_BASE_BPS
        } else {
            position.multiplier_bps
        };
        let previous_end = position.lock_end;
        update.farm.reweight(&mut position, staked, multiplier)?;
        if staked == 0 {
            position.lock_days = 0;
        }
        update.farm.track_lock(user, previous_end, &position);

        let receipt = Self::receipt(&update.farm, user, amount, &position, settled, now);
        debug!(%farm_id, user = %user.short(), amount, "unstaked");
        update.put(user, position);
        update.commit(shard);
        Ok(receipt)
    }

    /// Re-stake the current staked balance at a new tier, settling pending
    /// rewards at the old multiplier first. The lock end never moves earlier.
    pub fn relock(
        shard: &mut PoolShard,
        farm_id: FarmId,
        user: UserAddress,
        tier: LockTierConfig,
        now: u64,
    ) -> Result<StakeReceipt> {
        let mut update = Self::open(shard, farm_id, now)?;
        let mut position = update.load(shard, &user);
        if position.staked_balance == 0 {
            return Err(EngineError::InvalidAmount("nothing staked to relock"));
        }

        let settled = update.farm.settle(&mut position)?;
        let previous_end = position.lock_end;
        let lock_end = now
            .checked_add(tier.duration_secs())
            .ok_or(EngineError::Overflow("lock_end"))?
            .max(previous_end);
        let staked = position.staked_balance;
        update.farm.reweight(&mut position, staked, tier.multiplier_bps)?;
        position.lock_days = tier.days;
        position.lock_end = lock_end;
        update.farm.track_lock(user, previous_end, &position);

        let receipt = Self::receipt(&update.farm, user, 0, &position, settled, now);
        debug!(%farm_id, user = %user.short(), lock_days = tier.days, "relocked");
        update.put(user, position);
        update.commit(shard);
        Ok(receipt)
    }

    /// Pay out unclaimed plus pending rewards.
    ///
    /// A second claim with no time elapsed pays zero.
    pub fn claim(
        shard: &mut PoolShard,
        farm_id: FarmId,
        user: UserAddress,
        now: u64,
    ) -> Result<ClaimReceipt> {
        let mut update = Self::open(shard, farm_id, now)?;

        let amount = match update.get(shard, &user) {
            Some(mut position) => {
                update.farm.settle(&mut position)?;
                let amount = position.unclaimed_rewards;
                position.unclaimed_rewards = 0;
                position.claimed_rewards = position
                    .claimed_rewards
                    .checked_add(amount)
                    .ok_or(EngineError::Overflow("claimed_rewards"))?;
                update.farm.total_claimed = update
                    .farm
                    .total_claimed
                    .checked_add(amount)
                    .ok_or(EngineError::Overflow("total_claimed"))?;
                update.put(user, position);
                amount
            }
            None => 0,
        };

        let receipt = ClaimReceipt {
            farm_id,
            user,
            reward_token: update.farm.reward_token,
            amount,
            timestamp: now,
        };
        update.commit(shard);
        Ok(receipt)
    }

    /// The pool's farm as it stands at `now`, without mutating anything
    pub fn farm_at(shard: &PoolShard, now: u64) -> Result<Option<RewardSchedule>> {
        match &shard.farm {
            Some(farm) => Ok(Some(Self::advance(shard, farm, now)?.farm)),
            None => Ok(None),
        }
    }

    /// The user's position as it stands at `now`, with any lock that has
    /// ended already back at the base multiplier
    pub fn position_at(
        shard: &PoolShard,
        user: &UserAddress,
        now: u64,
    ) -> Result<Option<LpPosition>> {
        match &shard.farm {
            Some(farm) => Ok(Self::advance(shard, farm, now)?.get(shard, user)),
            None => Ok(shard.positions.get(user).cloned()),
        }
    }

    /// Unclaimed plus pending rewards as of `now`, without mutating anything
    pub fn pending_reward(
        shard: &PoolShard,
        farm_id: FarmId,
        user: &UserAddress,
        now: u64,
    ) -> Result<u128> {
        let update = Self::open(shard, farm_id, now)?;
        match update.get(shard, user) {
            Some(position) => update
                .farm
                .pending(&position)?
                .checked_add(position.unclaimed_rewards)
                .ok_or(EngineError::Overflow("pending rewards")),
            None => Ok(0),
        }
    }
}
