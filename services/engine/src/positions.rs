//! Per-user LP positions
//!
//! A [`PositionStore`] lives inside its pool's shard, so every position update
//! is serialized by the same lock as the pool's reserves.

use amm::MULTIPLIER_BASE_BPS;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use types::UserAddress;

/// One user's stake in one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpPosition {
    /// LP shares owned, staked ones included
    pub lp_balance: u128,
    /// Portion of `lp_balance` locked into the pool's farm
    pub staked_balance: u128,
    /// `staked_balance` scaled by `multiplier_bps`; back to the base weight once
    /// the lock has ended
    pub weighted_stake: u128,
    pub lock_days: u32,
    pub multiplier_bps: u32,
    /// Staked shares cannot be withdrawn before this timestamp
    pub lock_end: u64,
    /// Farm accumulator value at the last checkpoint
    pub reward_debt: u128,
    /// Settled but not yet claimed rewards
    pub unclaimed_rewards: u128,
    /// Lifetime rewards paid out
    pub claimed_rewards: u128,
}

impl Default for LpPosition {
    fn default() -> Self {
        Self {
            lp_balance: 0,
            staked_balance: 0,
            weighted_stake: 0,
            lock_days: 0,
            multiplier_bps: MULTIPLIER_BASE_BPS,
            lock_end: 0,
            reward_debt: 0,
            unclaimed_rewards: 0,
            claimed_rewards: 0,
        }
    }
}

impl LpPosition {
    /// Shares that can be withdrawn or newly staked
    pub fn free_balance(&self) -> u128 {
        self.lp_balance.saturating_sub(self.staked_balance)
    }

    pub fn is_locked_at(&self, now: u64) -> bool {
        self.staked_balance > 0 && now < self.lock_end
    }
}

/// Positions of a single pool, keyed by owner
#[derive(Debug, Clone, Default)]
pub struct PositionStore {
    positions: HashMap<UserAddress, LpPosition>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user: &UserAddress) -> Option<&LpPosition> {
        self.positions.get(user)
    }

    /// Copy of the user's position, or an empty one if none exists yet
    pub fn load(&self, user: &UserAddress) -> LpPosition {
        self.positions.get(user).cloned().unwrap_or_default()
    }

    /// Replace the stored position; positions are never removed
    pub fn store(&mut self, user: UserAddress, position: LpPosition) {
        self.positions.insert(user, position);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserAddress, &LpPosition)> {
        self.positions.iter()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sum of `lp_balance` over all positions
    pub fn total_lp(&self) -> Option<u128> {
        self.positions
            .values()
            .try_fold(0u128, |acc, p| acc.checked_add(p.lp_balance))
    }

    /// Sum of `weighted_stake` over all positions
    pub fn total_weighted_stake(&self) -> Option<u128> {
        self.positions
            .values()
            .try_fold(0u128, |acc, p| acc.checked_add(p.weighted_stake))
    }
}

impl FromIterator<(UserAddress, LpPosition)> for PositionStore {
    fn from_iter<I: IntoIterator<Item = (UserAddress, LpPosition)>>(iter: I) -> Self {
        Self {
            positions: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(byte: u8) -> UserAddress {
        UserAddress::from_bytes([byte; 20])
    }

    #[test]
    fn test_load_defaults_and_store() {
        let mut store = PositionStore::new();
        let empty = store.load(&user(1));
        assert_eq!(empty.lp_balance, 0);
        assert_eq!(empty.multiplier_bps, MULTIPLIER_BASE_BPS);
        assert!(store.is_empty());

        store.store(
            user(1),
            LpPosition {
                lp_balance: 500,
                staked_balance: 200,
                ..LpPosition::default()
            },
        );
        store.store(
            user(2),
            LpPosition {
                lp_balance: 300,
                ..LpPosition::default()
            },
        );
        assert_eq!(store.total_lp(), Some(800));
        assert_eq!(store.get(&user(1)).unwrap().free_balance(), 300);
    }

    #[test]
    fn test_lock_state() {
        let position = LpPosition {
            lp_balance: 10,
            staked_balance: 10,
            lock_end: 100,
            ..LpPosition::default()
        };
        assert!(position.is_locked_at(99));
        assert!(!position.is_locked_at(100));
        assert!(!LpPosition::default().is_locked_at(0));
    }
}
