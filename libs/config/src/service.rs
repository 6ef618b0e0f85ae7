//! Service defaults and constants
//!
//! Default configuration values used by the engine and the HTTP service when a
//! configuration file leaves them out.

/// Engine defaults
pub mod engine {
    /// Pool lock acquisition timeout (milliseconds) before `Busy` is returned
    pub const LOCK_TIMEOUT_MS: u64 = 250;

    /// LP shares permanently locked on the first deposit of every pool
    pub const MINIMUM_LIQUIDITY: u64 = 1_000;

    /// Highest accepted pool fee (basis points)
    pub const MAX_FEE_BPS: u32 = 10_000;

    /// Lock multiplier of an unboosted stake (1.0x)
    pub const BASE_MULTIPLIER_BPS: u32 = 10_000;
}

/// Time constants used by reward schedules and statistics
pub mod time {
    pub const SECONDS_PER_HOUR: u64 = 3_600;

    pub const SECONDS_PER_DAY: u64 = 86_400;

    pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;
}

/// HTTP service defaults
pub mod server {
    pub const BIND_ADDRESS: &str = "127.0.0.1";

    pub const PORT: u16 = 8080;

    /// Seconds a client should wait before retrying a `Busy` rejection
    pub const RETRY_AFTER_SECS: u64 = 1;

    /// Deadline applied to swaps that do not send one (seconds from receipt)
    pub const DEFAULT_SWAP_DEADLINE_SECS: u64 = 20 * 60;
}

/// Event delivery defaults
pub mod events {
    /// Bounded queue size for channel event sinks
    pub const EVENT_QUEUE_SIZE: usize = 10_000;
}
