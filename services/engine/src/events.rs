//! Engine events and delivery sinks
//!
//! Events are built from values computed under a pool lock and published only
//! after that lock is released.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use types::{FarmId, PoolId, TokenAddress, UserAddress};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    PoolCreated {
        pool_id: PoolId,
        token_a: TokenAddress,
        token_b: TokenAddress,
        fee_bps: u32,
    },
    Swap {
        pool_id: PoolId,
        user: UserAddress,
        token_in: TokenAddress,
        amount_in: u128,
        amount_out: u128,
        fee: u128,
        timestamp: u64,
    },
    LiquidityAdded {
        pool_id: PoolId,
        user: UserAddress,
        amount_a: u128,
        amount_b: u128,
        lp_minted: u128,
    },
    LiquidityRemoved {
        pool_id: PoolId,
        user: UserAddress,
        amount_a: u128,
        amount_b: u128,
        lp_burned: u128,
    },
    FarmCreated {
        farm_id: FarmId,
        pool_id: PoolId,
        reward_token: TokenAddress,
        reward_per_second: u128,
        pool_weight: u32,
    },
    RewardRateChanged {
        farm_id: FarmId,
        reward_per_second: u128,
    },
    Staked {
        farm_id: FarmId,
        user: UserAddress,
        amount: u128,
        lock_days: u32,
        lock_end: u64,
    },
    Unstaked {
        farm_id: FarmId,
        user: UserAddress,
        amount: u128,
    },
    Relocked {
        farm_id: FarmId,
        user: UserAddress,
        lock_days: u32,
        lock_end: u64,
    },
    RewardsClaimed {
        farm_id: FarmId,
        user: UserAddress,
        amount: u128,
    },
    PoolPaused {
        pool_id: PoolId,
        reason: String,
    },
    PoolResumed {
        pool_id: PoolId,
    },
}

/// Destination for engine events
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &EngineEvent);
}

/// Writes every event to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &EngineEvent) {
        match event {
            EngineEvent::Swap {
                pool_id,
                amount_in,
                amount_out,
                ..
            } => debug!(%pool_id, amount_in, amount_out, "swap executed"),
            EngineEvent::PoolPaused { pool_id, reason } => {
                warn!(%pool_id, %reason, "pool paused")
            }
            EngineEvent::PoolCreated { .. }
            | EngineEvent::FarmCreated { .. }
            | EngineEvent::RewardRateChanged { .. }
            | EngineEvent::PoolResumed { .. } => info!(?event, "engine event"),
            _ => debug!(?event, "engine event"),
        }
    }
}

/// Forwards events into a bounded channel without blocking.
///
/// Events are dropped when the consumer falls behind or has gone away; clones
/// share the drop counter.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<EngineEvent>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSink {
    pub fn bounded(capacity: usize) -> (Self, Receiver<EngineEvent>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        let sink = Self {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (sink, receiver)
    }

    /// Events dropped so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: &EngineEvent) {
        match self.sender.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(dropped, "event queue full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("event consumer gone, dropping event");
            }
        }
    }
}

/// Publishes to several sinks in order
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl EventSink for FanoutSink {
    fn publish(&self, event: &EngineEvent) {
        for sink in &self.sinks {
            sink.publish(event);
        }
    }
}

/// Drain `events` into `out` as JSON lines until every sender is gone.
///
/// Each line is flushed as it is written. Returns the number of events written.
pub fn write_event_log(events: &Receiver<EngineEvent>, mut out: impl Write) -> io::Result<u64> {
    let mut written = 0;
    for event in events.iter() {
        serde_json::to_writer(&mut out, &event)?;
        out.write_all(b"\n")?;
        out.flush()?;
        written += 1;
    }
    Ok(written)
}
