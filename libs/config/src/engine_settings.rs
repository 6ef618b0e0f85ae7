//! Engine settings
//!
//! Tunables consumed by the pool engine: lock timeout, minimum-liquidity lock,
//! fee ceiling and the staking lock tiers with their reward multipliers.

use crate::service::{engine, time};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Validation failures for configuration values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("lock_timeout_ms must be greater than zero")]
    ZeroLockTimeout,

    #[error("max_fee_bps {0} exceeds 10000")]
    FeeCeilingTooHigh(u32),

    #[error("at least one lock tier is required")]
    NoLockTiers,

    #[error("lock tier {days} days declared more than once")]
    DuplicateLockTier { days: u32 },

    #[error("lock tier {days} days has multiplier {multiplier_bps} bps, below the 10000 bps base")]
    MultiplierBelowBase { days: u32, multiplier_bps: u32 },

    #[error("flexible lock tier cannot carry a {0} bps multiplier")]
    BoostedFlexibleTier(u32),

    #[error("unknown token symbol '{0}'")]
    UnknownToken(String),

    #[error("token symbol '{0}' declared more than once")]
    DuplicateToken(String),

    #[error("token '{symbol}' declares {decimals} decimals (max 38)")]
    UnsupportedDecimals { symbol: String, decimals: u8 },

    #[error("pool {token_a}/{token_b} fee {fee_bps} bps exceeds max {max_fee_bps} bps")]
    PoolFeeTooHigh {
        token_a: String,
        token_b: String,
        fee_bps: u32,
        max_fee_bps: u32,
    },

    #[error("pool uses the same token '{0}' on both sides")]
    IdenticalPoolTokens(String),

    #[error("events.queue_size must be greater than zero when an event log is set")]
    ZeroEventQueue,

    #[error("invalid farm configuration for pool {pool}: {reason}")]
    InvalidFarm { pool: String, reason: String },
}

/// Staking lock period with its reward multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockTierConfig {
    /// Lock length in days; 0 means a flexible stake
    pub days: u32,
    /// Reward weight multiplier in basis points (10 000 = 1.0x)
    pub multiplier_bps: u32,
}

impl LockTierConfig {
    pub const fn new(days: u32, multiplier_bps: u32) -> Self {
        Self {
            days,
            multiplier_bps,
        }
    }

    /// Lock length in seconds
    pub fn duration_secs(&self) -> u64 {
        self.days as u64 * time::SECONDS_PER_DAY
    }
}

/// Default tiers: flexible, then 30/90/180/365 days with a 0/10/25/50% bonus
pub fn default_lock_tiers() -> Vec<LockTierConfig> {
    vec![
        LockTierConfig::new(0, 10_000),
        LockTierConfig::new(30, 10_000),
        LockTierConfig::new(90, 11_000),
        LockTierConfig::new(180, 12_500),
        LockTierConfig::new(365, 15_000),
    ]
}

/// Engine tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Per-pool lock acquisition timeout
    pub lock_timeout_ms: u64,
    /// LP shares locked forever on a pool's first deposit
    pub minimum_liquidity: u64,
    /// Highest fee a pool may be created with
    pub max_fee_bps: u32,
    /// Available staking lock tiers
    pub lock_tiers: Vec<LockTierConfig>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: engine::LOCK_TIMEOUT_MS,
            minimum_liquidity: engine::MINIMUM_LIQUIDITY,
            max_fee_bps: engine::MAX_FEE_BPS,
            lock_tiers: default_lock_tiers(),
        }
    }
}

impl EngineSettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Look up the tier for a lock length in days
    pub fn lock_tier(&self, days: u32) -> Option<LockTierConfig> {
        self.lock_tiers.iter().copied().find(|tier| tier.days == days)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.lock_timeout_ms == 0 {
            return Err(SettingsError::ZeroLockTimeout);
        }
        if self.max_fee_bps > engine::MAX_FEE_BPS {
            return Err(SettingsError::FeeCeilingTooHigh(self.max_fee_bps));
        }
        if self.lock_tiers.is_empty() {
            return Err(SettingsError::NoLockTiers);
        }
        for (i, tier) in self.lock_tiers.iter().enumerate() {
            if tier.multiplier_bps < engine::BASE_MULTIPLIER_BPS {
                return Err(SettingsError::MultiplierBelowBase {
                    days: tier.days,
                    multiplier_bps: tier.multiplier_bps,
                });
            }
            // a boost ends with the lock, so a zero-day tier would never pay it
            if tier.days == 0 && tier.multiplier_bps != engine::BASE_MULTIPLIER_BPS {
                return Err(SettingsError::BoostedFlexibleTier(tier.multiplier_bps));
            }
            if self.lock_tiers[..i].iter().any(|t| t.days == tier.days) {
                return Err(SettingsError::DuplicateLockTier { days: tier.days });
            }
        }
        Ok(())
    }
}
