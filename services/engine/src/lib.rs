//! # Pool Engine
//!
//! Deterministic state engine for constant-product liquidity pools with
//! proportional LP shares and time-weighted farming rewards.
//!
//! ## Architecture
//!
//! ```text
//! request ─▶ PoolEngine ─▶ PoolLedger (per-pool RwLock, timeout ⇒ Busy)
//!                              │
//!                              ├─ SwapEngine           quote / execute
//!                              ├─ LiquidityAccountant  mint / burn shares
//!                              ├─ RewardEmitter        accrue / stake / claim
//!                              └─ PositionStore        per-user balances
//!            ◀─ receipt ◀── events published after the lock is released
//! ```
//!
//! All amounts are `u128` base units; the arithmetic lives in the `amm` crate.
//! Invariant faults pause the affected pool until an operator resumes it.
//!
//! ## Usage
//!
//! ```rust
//! use pool_engine::{AddLiquidityRequest, PoolEngine};
//! use engine_config::EngineSettings;
//! use types::{TokenAddress, UserAddress};
//!
//! let engine = PoolEngine::with_settings(EngineSettings::default());
//! let usdc = TokenAddress::from_bytes([1; 20]);
//! let weth = TokenAddress::from_bytes([2; 20]);
//! let pool_id = engine.create_pool(usdc, weth, 30).unwrap();
//!
//! let receipt = engine
//!     .add_liquidity(&AddLiquidityRequest {
//!         user: UserAddress::from_bytes([7; 20]),
//!         pool_id,
//!         amount_a_desired: 10_000,
//!         amount_b_desired: 40_000,
//!         amount_a_min: 0,
//!         amount_b_min: 0,
//!     })
//!     .unwrap();
//! assert_eq!(receipt.lp_minted, 19_000);
//! ```

pub mod clock;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod liquidity;
pub mod positions;
pub mod rewards;
pub mod snapshot;
pub mod stats;
pub mod swap;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{PoolEngine, PoolSummary};
pub use error::{EngineError, ErrorCategory, Result};
pub use events::{
    write_event_log, ChannelSink, EngineEvent, EventSink, FanoutSink, TracingSink,
};
pub use ledger::{Pool, PoolDelta, PoolLedger, PoolShard};
pub use liquidity::{
    AddLiquidityReceipt, AddLiquidityRequest, LiquidityAccountant, RemoveLiquidityReceipt,
};
pub use positions::{LpPosition, PositionStore};
pub use rewards::{ClaimReceipt, FarmUpdate, RewardEmitter, RewardSchedule, StakeReceipt};
pub use snapshot::{EngineSnapshot, SnapshotError};
pub use stats::WindowTotals;
pub use swap::{SwapEngine, SwapReceipt, SwapRequest};
