//! Pool Ledger
//!
//! Single source of truth for pool state. Each pool lives in its own shard
//! behind a `parking_lot::RwLock`, together with its farm, positions and swap
//! statistics, so every mutation of a pool is serialized by exactly one lock.
//! Pool locks are acquired with a timeout and never more than one at a time.
//!
//! Reserve and supply changes go through [`PoolShard::apply_delta`], which
//! validates the whole delta before touching any field.

use crate::error::{EngineError, Result};
use crate::positions::PositionStore;
use crate::rewards::RewardSchedule;
use crate::stats::VolumeWindow;
use amm::{ConstantProductMath, MULTIPLIER_BASE_BPS, U256};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use types::{canonical_pair, FarmId, PoolId, TokenAddress};

/// Reserves, supply and fee accumulators of one constant-product pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    /// Lower address of the canonical pair
    pub token_a: TokenAddress,
    pub token_b: TokenAddress,
    pub fee_bps: u32,
    pub reserve_a: u128,
    pub reserve_b: u128,
    pub total_lp_supply: u128,
    pub cumulative_fee_a: u128,
    pub cumulative_fee_b: u128,
    /// Set by the circuit breaker; mutations are rejected while true
    pub paused: bool,
    pub created_at: u64,
}

impl Pool {
    pub fn contains(&self, token: &TokenAddress) -> bool {
        &self.token_a == token || &self.token_b == token
    }

    /// `(reserve_in, reserve_out, a_in)` for a swap paying `token_in`
    pub fn oriented(&self, token_in: &TokenAddress) -> Result<(u128, u128, bool)> {
        if token_in == &self.token_a {
            Ok((self.reserve_a, self.reserve_b, true))
        } else if token_in == &self.token_b {
            Ok((self.reserve_b, self.reserve_a, false))
        } else {
            Err(EngineError::UnknownToken {
                pool_id: self.id,
                token: *token_in,
            })
        }
    }

    pub fn other_token(&self, a_in: bool) -> TokenAddress {
        if a_in {
            self.token_b
        } else {
            self.token_a
        }
    }

    pub fn invariant(&self) -> U256 {
        ConstantProductMath::invariant(self.reserve_a, self.reserve_b)
    }

    pub fn is_empty(&self) -> bool {
        self.total_lp_supply == 0
    }

    /// Supply is zero exactly when both reserves are zero, and a funded pool
    /// has both sides funded
    pub fn check_invariants(&self) -> Result<()> {
        let reserves_empty = self.reserve_a == 0 && self.reserve_b == 0;
        let reserves_full = self.reserve_a > 0 && self.reserve_b > 0;
        let consistent = if self.total_lp_supply == 0 {
            reserves_empty
        } else {
            reserves_full
        };
        if consistent {
            Ok(())
        } else {
            Err(EngineError::InvariantViolated {
                pool_id: self.id,
                reason: format!(
                    "supply {} with reserves {}/{}",
                    self.total_lp_supply, self.reserve_a, self.reserve_b
                ),
            })
        }
    }
}

/// Signed change to a pool's reserves and supply plus fee accumulator credits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolDelta {
    pub reserve_a: i128,
    pub reserve_b: i128,
    pub lp_supply: i128,
    pub fee_a: u128,
    pub fee_b: u128,
}

impl PoolDelta {
    /// Convert an unsigned amount for use in a delta
    pub fn signed(amount: u128, context: &'static str) -> Result<i128> {
        i128::try_from(amount).map_err(|_| EngineError::Overflow(context))
    }
}

fn shift(pool_id: PoolId, value: u128, delta: i128, field: &'static str) -> Result<u128> {
    value.checked_add_signed(delta).ok_or(if delta < 0 {
        EngineError::ReserveUnderflow { pool_id, field }
    } else {
        EngineError::Overflow(field)
    })
}

/// Everything guarded by one pool lock
#[derive(Debug, Clone)]
pub struct PoolShard {
    pub pool: Pool,
    pub farm: Option<RewardSchedule>,
    pub positions: PositionStore,
    pub stats: VolumeWindow,
}

impl PoolShard {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            farm: None,
            positions: PositionStore::new(),
            stats: VolumeWindow::new(),
        }
    }

    /// The only mutator of reserves, supply and fee accumulators.
    ///
    /// Nothing is written unless every resulting value is valid.
    pub fn apply_delta(&mut self, delta: &PoolDelta) -> Result<()> {
        let id = self.pool.id;
        let mut next = self.pool.clone();
        next.reserve_a = shift(id, next.reserve_a, delta.reserve_a, "reserve_a")?;
        next.reserve_b = shift(id, next.reserve_b, delta.reserve_b, "reserve_b")?;
        next.total_lp_supply = shift(id, next.total_lp_supply, delta.lp_supply, "total_lp_supply")?;
        next.cumulative_fee_a = next
            .cumulative_fee_a
            .checked_add(delta.fee_a)
            .ok_or(EngineError::Overflow("cumulative_fee_a"))?;
        next.cumulative_fee_b = next
            .cumulative_fee_b
            .checked_add(delta.fee_b)
            .ok_or(EngineError::Overflow("cumulative_fee_b"))?;
        next.check_invariants()?;

        self.pool = next;
        Ok(())
    }

    /// Full consistency check: pool invariants, share conservation and farm
    /// denominators
    pub fn audit(&self) -> Result<()> {
        self.pool.check_invariants()?;

        let violated = |reason: String| EngineError::InvariantViolated {
            pool_id: self.pool.id,
            reason,
        };

        let total_lp = self
            .positions
            .total_lp()
            .ok_or_else(|| violated("position balances overflow".to_string()))?;
        if total_lp != self.pool.total_lp_supply {
            return Err(violated(format!(
                "positions hold {} shares, supply is {}",
                total_lp, self.pool.total_lp_supply
            )));
        }

        if let Some((user, _)) = self
            .positions
            .iter()
            .find(|(_, p)| p.staked_balance > p.lp_balance)
        {
            return Err(violated(format!("{} staked more than it owns", user)));
        }

        if let Some(farm) = &self.farm {
            let weighted = self
                .positions
                .total_weighted_stake()
                .ok_or_else(|| violated("weighted stakes overflow".to_string()))?;
            if weighted != farm.total_weighted_stake {
                return Err(violated(format!(
                    "weighted stake {} does not match farm total {}",
                    weighted, farm.total_weighted_stake
                )));
            }

            let boosted = self
                .positions
                .iter()
                .filter(|(_, p)| p.staked_balance > 0 && p.multiplier_bps != MULTIPLIER_BASE_BPS);
            let mut tracked = 0usize;
            for (user, position) in boosted {
                if !farm.lock_expiries.contains(&(position.lock_end, *user)) {
                    return Err(violated(format!("{} holds an untracked lock boost", user)));
                }
                tracked += 1;
            }
            if tracked != farm.lock_expiries.len() {
                return Err(violated(format!(
                    "{} lock expiries tracked for {} boosted positions",
                    farm.lock_expiries.len(),
                    tracked
                )));
            }
        }
        Ok(())
    }
}

/// Registry of pool shards with pair and farm indexes
pub struct PoolLedger {
    pools: DashMap<PoolId, Arc<RwLock<PoolShard>>>,
    pair_index: DashMap<(TokenAddress, TokenAddress), PoolId>,
    farm_index: DashMap<FarmId, PoolId>,
    next_pool_id: AtomicU64,
    next_farm_id: AtomicU64,
    lock_timeout: Duration,
    max_fee_bps: u32,
}

impl PoolLedger {
    pub fn new(lock_timeout: Duration, max_fee_bps: u32) -> Self {
        Self {
            pools: DashMap::new(),
            pair_index: DashMap::new(),
            farm_index: DashMap::new(),
            next_pool_id: AtomicU64::new(1),
            next_farm_id: AtomicU64::new(1),
            lock_timeout,
            max_fee_bps,
        }
    }

    /// Register a new pool for the unordered pair `(token_x, token_y)`
    pub fn create_pool(
        &self,
        token_x: TokenAddress,
        token_y: TokenAddress,
        fee_bps: u32,
        now: u64,
    ) -> Result<Pool> {
        if token_x == token_y {
            return Err(EngineError::InvalidPair(token_x));
        }
        if fee_bps > self.max_fee_bps {
            return Err(EngineError::InvalidFee {
                fee_bps,
                max_fee_bps: self.max_fee_bps,
            });
        }

        let (token_a, token_b) = canonical_pair(token_x, token_y);
        match self.pair_index.entry((token_a, token_b)) {
            Entry::Occupied(existing) => Err(EngineError::DuplicatePool {
                token_a,
                token_b,
                existing: *existing.get(),
            }),
            Entry::Vacant(slot) => {
                let id = PoolId::new(self.next_pool_id.fetch_add(1, Ordering::SeqCst));
                let pool = Pool {
                    id,
                    token_a,
                    token_b,
                    fee_bps,
                    reserve_a: 0,
                    reserve_b: 0,
                    total_lp_supply: 0,
                    cumulative_fee_a: 0,
                    cumulative_fee_b: 0,
                    paused: false,
                    created_at: now,
                };
                self.pools
                    .insert(id, Arc::new(RwLock::new(PoolShard::new(pool.clone()))));
                slot.insert(id);
                info!(pool_id = %id, %token_a, %token_b, fee_bps, "pool created");
                Ok(pool)
            }
        }
    }

    fn shard(&self, pool_id: PoolId) -> Result<Arc<RwLock<PoolShard>>> {
        self.pools
            .get(&pool_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(EngineError::PoolNotFound(pool_id))
    }

    /// Run `f` against a consistent snapshot of the pool
    pub fn read<T>(&self, pool_id: PoolId, f: impl FnOnce(&PoolShard) -> Result<T>) -> Result<T> {
        let shard = self.shard(pool_id)?;
        let guard = shard.try_read_for(self.lock_timeout).ok_or_else(|| {
            warn!(%pool_id, "read lock timed out");
            EngineError::Busy(pool_id)
        })?;
        f(&guard)
    }

    /// Run a mutation under the pool's write lock.
    ///
    /// Rejects paused pools. An invariant fault returned by `f` pauses the pool.
    pub fn write<T>(
        &self,
        pool_id: PoolId,
        f: impl FnOnce(&mut PoolShard) -> Result<T>,
    ) -> Result<T> {
        self.write_inner(pool_id, false, f)
    }

    fn write_inner<T>(
        &self,
        pool_id: PoolId,
        allow_paused: bool,
        f: impl FnOnce(&mut PoolShard) -> Result<T>,
    ) -> Result<T> {
        let shard = self.shard(pool_id)?;
        let mut guard = shard.try_write_for(self.lock_timeout).ok_or_else(|| {
            warn!(%pool_id, "write lock timed out");
            EngineError::Busy(pool_id)
        })?;

        if guard.pool.paused && !allow_paused {
            return Err(EngineError::PoolPaused(pool_id));
        }

        let result = f(&mut guard);
        if let Err(err) = &result {
            if err.is_fault() {
                guard.pool.paused = true;
                error!(%pool_id, error = %err, "invariant fault, pool paused");
            }
        }
        result
    }

    pub fn get_reserves(&self, pool_id: PoolId) -> Result<(u128, u128)> {
        self.read(pool_id, |shard| Ok((shard.pool.reserve_a, shard.pool.reserve_b)))
    }

    pub fn pool(&self, pool_id: PoolId) -> Result<Pool> {
        self.read(pool_id, |shard| Ok(shard.pool.clone()))
    }

    /// Apply a raw delta to a pool, outside of any swap or liquidity flow
    pub fn apply_delta(&self, pool_id: PoolId, delta: PoolDelta) -> Result<Pool> {
        self.write(pool_id, |shard| {
            shard.apply_delta(&delta)?;
            Ok(shard.pool.clone())
        })
    }

    pub fn pool_ids(&self) -> Vec<PoolId> {
        let mut ids: Vec<PoolId> = self.pools.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn find_pool(&self, token_x: TokenAddress, token_y: TokenAddress) -> Option<PoolId> {
        self.pair_index
            .get(&canonical_pair(token_x, token_y))
            .map(|entry| *entry.value())
    }

    pub fn farm_pool(&self, farm_id: FarmId) -> Result<PoolId> {
        self.farm_index
            .get(&farm_id)
            .map(|entry| *entry.value())
            .ok_or(EngineError::FarmNotFound(farm_id))
    }

    pub fn farm_ids(&self) -> Vec<FarmId> {
        let mut ids: Vec<FarmId> = self.farm_index.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    /// Attach a farm to `pool_id`.
    ///
    /// `prepare` validates under the pool lock and returns the constructor of
    /// the schedule; a farm id is taken only once it succeeds, and the farm is
    /// indexed before the lock is released.
    pub(crate) fn attach_farm<F>(
        &self,
        pool_id: PoolId,
        prepare: impl FnOnce(&PoolShard) -> Result<F>,
    ) -> Result<RewardSchedule>
    where
        F: FnOnce(FarmId) -> RewardSchedule,
    {
        self.write(pool_id, |shard| {
            if let Some(existing) = &shard.farm {
                return Err(EngineError::DuplicateFarm {
                    pool_id,
                    existing: existing.farm_id,
                });
            }
            let build = prepare(shard)?;
            let farm_id = FarmId::new(self.next_farm_id.fetch_add(1, Ordering::SeqCst));
            let schedule = build(farm_id);
            self.farm_index.insert(farm_id, pool_id);
            shard.farm = Some(schedule.clone());
            Ok(schedule)
        })
    }

    /// Operator pause. Returns false if the pool was already paused.
    pub fn pause_pool(&self, pool_id: PoolId, reason: &str) -> Result<bool> {
        self.write_inner(pool_id, true, |shard| {
            let was_running = !shard.pool.paused;
            shard.pool.paused = true;
            if was_running {
                warn!(%pool_id, reason, "pool paused by operator");
            }
            Ok(was_running)
        })
    }

    /// Resume a paused pool after a full audit. Returns false if it was running.
    pub fn resume_pool(&self, pool_id: PoolId) -> Result<bool> {
        let shard = self.shard(pool_id)?;
        let mut guard = shard
            .try_write_for(self.lock_timeout)
            .ok_or(EngineError::Busy(pool_id))?;
        if !guard.pool.paused {
            return Ok(false);
        }
        guard.audit()?;
        guard.pool.paused = false;
        info!(%pool_id, "pool resumed");
        Ok(true)
    }

    /// Id counters, for snapshots
    pub(crate) fn next_ids(&self) -> (u64, u64) {
        (
            self.next_pool_id.load(Ordering::SeqCst),
            self.next_farm_id.load(Ordering::SeqCst),
        )
    }

    /// Insert a fully built shard, used when restoring a snapshot
    pub(crate) fn insert_shard(&self, shard: PoolShard) -> Result<()> {
        let id = shard.pool.id;
        let pair = (shard.pool.token_a, shard.pool.token_b);
        match self.pair_index.entry(pair) {
            Entry::Occupied(existing) => {
                return Err(EngineError::DuplicatePool {
                    token_a: pair.0,
                    token_b: pair.1,
                    existing: *existing.get(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }
        if let Some(farm) = &shard.farm {
            self.farm_index.insert(farm.farm_id, id);
            self.next_farm_id
                .fetch_max(farm.farm_id.inner() + 1, Ordering::SeqCst);
        }
        self.next_pool_id.fetch_max(id.inner() + 1, Ordering::SeqCst);
        self.pools.insert(id, Arc::new(RwLock::new(shard)));
        Ok(())
    }

    pub(crate) fn bump_ids(&self, next_pool_id: u64, next_farm_id: u64) {
        self.next_pool_id.fetch_max(next_pool_id, Ordering::SeqCst);
        self.next_farm_id.fetch_max(next_farm_id, Ordering::SeqCst);
    }
}
