//! Engine snapshots
//!
//! A snapshot is taken one pool lock at a time and serialized as JSON. Every
//! pool is audited again when a snapshot is restored.

use crate::error::EngineError;
use crate::ledger::{Pool, PoolShard};
use crate::positions::{LpPosition, PositionStore};
use crate::rewards::RewardSchedule;
use crate::stats::VolumeWindow;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use types::{PoolId, UserAddress};

pub const SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("{pool_id} failed audit: {source}")]
    Inconsistent {
        pool_id: PoolId,
        #[source]
        source: EngineError,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub user: UserAddress,
    pub position: LpPosition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRecord {
    pub pool: Pool,
    pub farm: Option<RewardSchedule>,
    pub positions: Vec<PositionRecord>,
    #[serde(default)]
    pub stats: VolumeWindow,
}

impl PoolRecord {
    pub(crate) fn from_shard(shard: &PoolShard) -> Self {
        let mut positions: Vec<PositionRecord> = shard
            .positions
            .iter()
            .map(|(user, position)| PositionRecord {
                user: *user,
                position: position.clone(),
            })
            .collect();
        positions.sort_by_key(|record| record.user);

        Self {
            pool: shard.pool.clone(),
            farm: shard.farm.clone(),
            positions,
            stats: shard.stats.clone(),
        }
    }

    /// Rebuild and audit the shard
    pub(crate) fn into_shard(self) -> Result<PoolShard, SnapshotError> {
        let pool_id = self.pool.id;
        let shard = PoolShard {
            pool: self.pool,
            farm: self.farm,
            positions: self
                .positions
                .into_iter()
                .map(|record| (record.user, record.position))
                .collect::<PositionStore>(),
            stats: self.stats,
        };
        shard
            .audit()
            .map_err(|source| SnapshotError::Inconsistent { pool_id, source })?;
        Ok(shard)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version: u32,
    pub taken_at: u64,
    pub next_pool_id: u64,
    pub next_farm_id: u64,
    pub pools: Vec<PoolRecord>,
}

impl EngineSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: EngineSnapshot = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }

    /// Write atomically: temporary file in the same directory, then rename
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, self.to_json()?)?;
        fs::rename(&tmp, path)?;
        info!(path = %path.display(), pools = self.pools.len(), "snapshot written");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let json = fs::read_to_string(path)?;
        let snapshot = Self::from_json(&json)?;
        info!(path = %path.display(), pools = snapshot.pools.len(), "snapshot loaded");
        Ok(snapshot)
    }
}
