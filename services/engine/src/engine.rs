//! Pool Engine facade
//!
//! Routes every request to the owning pool's shard, reads the clock only once
//! that shard's lock is held, and publishes events after the lock is released.

use crate::clock::{Clock, SystemClock};
use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EventSink, TracingSink};
use crate::ledger::{Pool, PoolLedger, PoolShard};
use crate::liquidity::{
    AddLiquidityReceipt, AddLiquidityRequest, LiquidityAccountant, RemoveLiquidityReceipt,
};
use crate::positions::LpPosition;
use crate::rewards::{ClaimReceipt, RewardEmitter, RewardSchedule, StakeReceipt};
use crate::snapshot::{EngineSnapshot, PoolRecord, SnapshotError, SNAPSHOT_VERSION};
use crate::stats::WindowTotals;
use crate::swap::{SwapEngine, SwapReceipt, SwapRequest};
use amm::{RewardMath, SwapQuote};
use engine_config::{EngineSettings, LockTierConfig};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use types::{FarmId, PoolId, TokenAddress, UserAddress};

/// Read-only view of a pool for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    pub pool: Pool,
    pub farm: Option<RewardSchedule>,
    pub stats_24h: WindowTotals,
    pub position_count: usize,
    pub user_position: Option<LpPosition>,
}

pub struct PoolEngine {
    ledger: PoolLedger,
    settings: EngineSettings,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
}

impl PoolEngine {
    pub fn new(settings: EngineSettings, clock: Arc<dyn Clock>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            ledger: PoolLedger::new(settings.lock_timeout(), settings.max_fee_bps),
            settings,
            clock,
            sink,
        }
    }

    /// Wall clock and log-only events
    pub fn with_settings(settings: EngineSettings) -> Self {
        Self::new(settings, Arc::new(SystemClock), Arc::new(TracingSink))
    }

    pub fn ledger(&self) -> &PoolLedger {
        &self.ledger
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    fn lock_tier(&self, days: u32) -> Result<LockTierConfig> {
        self.settings
            .lock_tier(days)
            .ok_or(EngineError::InvalidLockPeriod(days))
    }

    /// Mutate a pool, announcing a circuit-breaker trip once the lock is gone
    fn mutate<T>(&self, pool_id: PoolId, f: impl FnOnce(&mut PoolShard, u64) -> Result<T>) -> Result<T> {
        let result = self.ledger.write(pool_id, |shard| f(shard, self.clock.now()));
        if let Err(err) = &result {
            if err.is_fault() {
                self.sink.publish(&EngineEvent::PoolPaused {
                    pool_id,
                    reason: err.to_string(),
                });
            }
        }
        result
    }

    // ---- pools ----

    pub fn create_pool(&self, token_x: TokenAddress, token_y: TokenAddress, fee_bps: u32) -> Result<PoolId> {
        let pool = self.ledger.create_pool(token_x, token_y, fee_bps, self.clock.now())?;
        self.sink.publish(&EngineEvent::PoolCreated {
            pool_id: pool.id,
            token_a: pool.token_a,
            token_b: pool.token_b,
            fee_bps,
        });
        Ok(pool.id)
    }

    pub fn get_reserves(&self, pool_id: PoolId) -> Result<(u128, u128)> {
        self.ledger.get_reserves(pool_id)
    }

    pub fn pool(&self, pool_id: PoolId) -> Result<Pool> {
        self.ledger.pool(pool_id)
    }

    pub fn list_pools(&self) -> Vec<PoolId> {
        self.ledger.pool_ids()
    }

    pub fn find_pool(&self, token_x: TokenAddress, token_y: TokenAddress) -> Option<PoolId> {
        self.ledger.find_pool(token_x, token_y)
    }

    pub fn pool_summary(&self, pool_id: PoolId, user: Option<&UserAddress>) -> Result<PoolSummary> {
        let now = self.clock.now();
        self.ledger.read(pool_id, |shard| {
            let user_position = match user {
                Some(user) => RewardEmitter::position_at(shard, user, now)?,
                None => None,
            };
            Ok(PoolSummary {
                pool: shard.pool.clone(),
                farm: RewardEmitter::farm_at(shard, now)?,
                stats_24h: shard.stats.totals(now),
                position_count: shard.positions.len(),
                user_position,
            })
        })
    }

    pub fn pause_pool(&self, pool_id: PoolId, reason: &str) -> Result<bool> {
        let paused = self.ledger.pause_pool(pool_id, reason)?;
        if paused {
            self.sink.publish(&EngineEvent::PoolPaused {
                pool_id,
                reason: reason.to_string(),
            });
        }
        Ok(paused)
    }

    pub fn resume_pool(&self, pool_id: PoolId) -> Result<bool> {
        let resumed = self.ledger.resume_pool(pool_id)?;
        if resumed {
            self.sink.publish(&EngineEvent::PoolResumed { pool_id });
        }
        Ok(resumed)
    }

    // ---- swaps ----

    pub fn quote(&self, pool_id: PoolId, token_in: TokenAddress, amount_in: u128) -> Result<SwapQuote> {
        self.ledger.read(pool_id, |shard| {
            if shard.pool.paused {
                return Err(EngineError::PoolPaused(pool_id));
            }
            SwapEngine::quote(&shard.pool, &token_in, amount_in)
        })
    }

    pub fn execute_swap(&self, request: &SwapRequest) -> Result<SwapReceipt> {
        let receipt = self.mutate(request.pool_id, |shard, now| {
            SwapEngine::execute(shard, request, now)
        })?;
        self.sink.publish(&EngineEvent::Swap {
            pool_id: receipt.pool_id,
            user: receipt.user,
            token_in: receipt.token_in,
            amount_in: receipt.amount_in,
            amount_out: receipt.amount_out,
            fee: receipt.fee,
            timestamp: receipt.timestamp,
        });
        Ok(receipt)
    }

    // ---- liquidity ----

    pub fn add_liquidity(&self, request: &AddLiquidityRequest) -> Result<AddLiquidityReceipt> {
        let minimum_liquidity = self.settings.minimum_liquidity as u128;
        let receipt = self.mutate(request.pool_id, |shard, now| {
            LiquidityAccountant::add(shard, request, minimum_liquidity, now)
        })?;
        self.sink.publish(&EngineEvent::LiquidityAdded {
            pool_id: receipt.pool_id,
            user: receipt.user,
            amount_a: receipt.amount_a_used,
            amount_b: receipt.amount_b_used,
            lp_minted: receipt.lp_minted,
        });
        Ok(receipt)
    }

    pub fn remove_liquidity(
        &self,
        user: UserAddress,
        pool_id: PoolId,
        lp_amount: u128,
        amount_a_min: u128,
        amount_b_min: u128,
    ) -> Result<RemoveLiquidityReceipt> {
        let receipt = self.mutate(pool_id, |shard, now| {
            LiquidityAccountant::remove(shard, user, lp_amount, amount_a_min, amount_b_min, now)
        })?;
        self.sink.publish(&EngineEvent::LiquidityRemoved {
            pool_id,
            user,
            amount_a: receipt.amount_a,
            amount_b: receipt.amount_b,
            lp_burned: receipt.lp_burned,
        });
        Ok(receipt)
    }

    pub fn preview_remove_liquidity(&self, pool_id: PoolId, lp_amount: u128) -> Result<(u128, u128)> {
        self.ledger
            .read(pool_id, |shard| LiquidityAccountant::preview_remove(&shard.pool, lp_amount))
    }

    // ---- farms ----

    pub fn create_farm(
        &self,
        pool_id: PoolId,
        reward_token: TokenAddress,
        reward_per_second: u128,
        pool_weight: u32,
        end_time: Option<u64>,
    ) -> Result<FarmId> {
        if pool_weight == 0 {
            return Err(EngineError::InvalidAmount("pool weight must be positive"));
        }
        let schedule = self.ledger.attach_farm(pool_id, |_| {
            let now = self.clock.now();
            if end_time.is_some_and(|end| end <= now) {
                return Err(EngineError::InvalidAmount("farm end time must be in the future"));
            }
            // emission per second must be representable
            RewardMath::emission(1, reward_per_second, pool_weight)?;
            Ok(move |farm_id: FarmId| {
                RewardSchedule::new(
                    farm_id,
                    pool_id,
                    reward_token,
                    reward_per_second,
                    pool_weight,
                    end_time,
                    now,
                )
            })
        })?;

        info!(farm_id = %schedule.farm_id, %pool_id, reward_per_second, pool_weight, "farm created");
        self.sink.publish(&EngineEvent::FarmCreated {
            farm_id: schedule.farm_id,
            pool_id,
            reward_token,
            reward_per_second,
            pool_weight,
        });
        Ok(schedule.farm_id)
    }

    /// Farm as of now, accrued and with ended locks applied
    pub fn farm(&self, farm_id: FarmId) -> Result<RewardSchedule> {
        let pool_id = self.ledger.farm_pool(farm_id)?;
        let now = self.clock.now();
        self.ledger.read(pool_id, |shard| {
            RewardEmitter::farm_at(shard, now)?
                .filter(|farm| farm.farm_id == farm_id)
                .ok_or(EngineError::FarmNotFound(farm_id))
        })
    }

    pub fn farm_ids(&self) -> Vec<FarmId> {
        self.ledger.farm_ids()
    }

    pub fn set_reward_rate(&self, farm_id: FarmId, reward_per_second: u128) -> Result<()> {
        let pool_id = self.ledger.farm_pool(farm_id)?;
        self.mutate(pool_id, |shard, now| {
            RewardEmitter::set_reward_rate(shard, farm_id, reward_per_second, now)
        })?;
        self.sink.publish(&EngineEvent::RewardRateChanged {
            farm_id,
            reward_per_second,
        });
        Ok(())
    }

    /// Advance the pool's farm accumulator to now; no-op for pools without a farm
    pub fn accrue(&self, pool_id: PoolId) -> Result<()> {
        self.mutate(pool_id, RewardEmitter::accrue)
    }

    pub fn stake(&self, user: UserAddress, farm_id: FarmId, amount: u128, lock_days: u32) -> Result<StakeReceipt> {
        let tier = self.lock_tier(lock_days)?;
        let pool_id = self.ledger.farm_pool(farm_id)?;
        let receipt = self.mutate(pool_id, |shard, now| {
            RewardEmitter::stake(shard, farm_id, user, amount, tier, now)
        })?;
        self.sink.publish(&EngineEvent::Staked {
            farm_id,
            user,
            amount,
            lock_days: receipt.lock_days,
            lock_end: receipt.lock_end,
        });
        Ok(receipt)
    }

    pub fn unstake(&self, user: UserAddress, farm_id: FarmId, amount: u128) -> Result<StakeReceipt> {
        let pool_id = self.ledger.farm_pool(farm_id)?;
        let receipt = self.mutate(pool_id, |shard, now| {
            RewardEmitter::unstake(shard, farm_id, user, amount, now)
        })?;
        self.sink.publish(&EngineEvent::Unstaked {
            farm_id,
            user,
            amount,
        });
        Ok(receipt)
    }

    pub fn relock(&self, user: UserAddress, farm_id: FarmId, lock_days: u32) -> Result<StakeReceipt> {
        let tier = self.lock_tier(lock_days)?;
        let pool_id = self.ledger.farm_pool(farm_id)?;
        let receipt = self.mutate(pool_id, |shard, now| {
            RewardEmitter::relock(shard, farm_id, user, tier, now)
        })?;
        self.sink.publish(&EngineEvent::Relocked {
            farm_id,
            user,
            lock_days: receipt.lock_days,
            lock_end: receipt.lock_end,
        });
        Ok(receipt)
    }

    pub fn claim(&self, user: UserAddress, farm_id: FarmId) -> Result<ClaimReceipt> {
        let pool_id = self.ledger.farm_pool(farm_id)?;
        let receipt = self.mutate(pool_id, |shard, now| {
            RewardEmitter::claim(shard, farm_id, user, now)
        })?;
        if receipt.amount > 0 {
            self.sink.publish(&EngineEvent::RewardsClaimed {
                farm_id,
                user,
                amount: receipt.amount,
            });
        }
        Ok(receipt)
    }

    pub fn pending_reward(&self, user: &UserAddress, farm_id: FarmId) -> Result<u128> {
        let pool_id = self.ledger.farm_pool(farm_id)?;
        let now = self.clock.now();
        self.ledger
            .read(pool_id, |shard| RewardEmitter::pending_reward(shard, farm_id, user, now))
    }

    // ---- positions ----

    /// Position as of now; a lock that has ended shows the base multiplier
    pub fn position(&self, user: &UserAddress, pool_id: PoolId) -> Result<Option<LpPosition>> {
        let now = self.clock.now();
        self.ledger
            .read(pool_id, |shard| RewardEmitter::position_at(shard, user, now))
    }

    /// Positions of `user` across all pools, one pool lock at a time
    pub fn positions_for_user(&self, user: &UserAddress) -> Result<Vec<(PoolId, LpPosition)>> {
        let mut positions = Vec::new();
        for pool_id in self.ledger.pool_ids() {
            if let Some(position) = self.position(user, pool_id)? {
                positions.push((pool_id, position));
            }
        }
        Ok(positions)
    }

    // ---- snapshots ----

    pub fn snapshot(&self) -> Result<EngineSnapshot> {
        let (next_pool_id, next_farm_id) = self.ledger.next_ids();
        let mut pools = Vec::new();
        for pool_id in self.ledger.pool_ids() {
            pools.push(self.ledger.read(pool_id, |shard| Ok(PoolRecord::from_shard(shard)))?);
        }
        Ok(EngineSnapshot {
            version: SNAPSHOT_VERSION,
            taken_at: self.clock.now(),
            next_pool_id,
            next_farm_id,
            pools,
        })
    }

    /// Rebuild an engine from a snapshot, auditing every pool
    pub fn restore(
        snapshot: EngineSnapshot,
        settings: EngineSettings,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> std::result::Result<Self, SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        let engine = Self::new(settings, clock, sink);
        for record in snapshot.pools {
            let shard = record.into_shard()?;
            engine.ledger.insert_shard(shard)?;
        }
        engine
            .ledger
            .bump_ids(snapshot.next_pool_id, snapshot.next_farm_id);
        info!(pools = engine.ledger.len(), "engine restored from snapshot");
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::ChannelSink;

    fn token(byte: u8) -> TokenAddress {
        TokenAddress::from_bytes([byte; 20])
    }

    #[test]
    fn test_events_follow_operations() {
        let clock = ManualClock::new(1_000);
        let (sink, events) = ChannelSink::bounded(16);
        let engine = PoolEngine::new(EngineSettings::default(), Arc::new(clock), Arc::new(sink));

        let pool_id = engine.create_pool(token(1), token(2), 30).unwrap();
        engine
            .add_liquidity(&AddLiquidityRequest {
                user: UserAddress::from_bytes([5; 20]),
                pool_id,
                amount_a_desired: 10_000,
                amount_b_desired: 10_000,
                amount_a_min: 0,
                amount_b_min: 0,
            })
            .unwrap();

        assert!(matches!(events.try_recv().unwrap(), EngineEvent::PoolCreated { .. }));
        assert!(matches!(
            events.try_recv().unwrap(),
            EngineEvent::LiquidityAdded { lp_minted: 9_000, .. }
        ));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_rejected_farm_keeps_next_id() {
        let clock = ManualClock::new(1_000);
        let engine = PoolEngine::new(
            EngineSettings::default(),
            Arc::new(clock),
            Arc::new(TracingSink),
        );
        let first = engine.create_pool(token(1), token(2), 30).unwrap();
        let second = engine.create_pool(token(1), token(4), 30).unwrap();

        assert_eq!(
            engine.create_farm(first, token(3), 1, 1, Some(1_000)).unwrap_err(),
            EngineError::InvalidAmount("farm end time must be in the future")
        );
        assert_eq!(
            engine.create_farm(second, token(3), u128::MAX, u32::MAX, None).unwrap_err(),
            EngineError::Overflow("emission")
        );

        let farm_id = engine.create_farm(first, token(3), 1, 1, None).unwrap();
        assert_eq!(farm_id, FarmId::new(1));
        assert_eq!(engine.farm(farm_id).unwrap().pool_id, first);
    }

    #[test]
    fn test_unknown_lock_period() {
        let engine = PoolEngine::with_settings(EngineSettings::default());
        let pool_id = engine.create_pool(token(1), token(2), 30).unwrap();
        let farm_id = engine.create_farm(pool_id, token(3), 1, 1, None).unwrap();
        assert_eq!(
            engine
                .stake(UserAddress::from_bytes([5; 20]), farm_id, 1, 45)
                .unwrap_err(),
            EngineError::InvalidLockPeriod(45)
        );
        assert_eq!(
            engine.create_farm(pool_id, token(3), 1, 1, None).unwrap_err(),
            EngineError::DuplicateFarm {
                pool_id,
                existing: farm_id
            }
        );
    }
}
