//! # Pool Engine Configuration
//!
//! Defaults, engine tunables and service configuration loading shared by the
//! pool engine and its HTTP service.
//!
//! ## Usage
//!
//! ```rust
//! use engine_config::{EngineSettings, service};
//!
//! let settings = EngineSettings::default();
//! assert_eq!(settings.minimum_liquidity, service::engine::MINIMUM_LIQUIDITY);
//! assert_eq!(settings.lock_tier(365).unwrap().multiplier_bps, 15_000);
//! ```

pub mod engine_settings;
pub mod service;
pub mod service_config;

pub use engine_settings::{default_lock_tiers, EngineSettings, LockTierConfig, SettingsError};
pub use service_config::{
    EventsConfig, FarmConfig, LogFormat, LoggingConfig, PoolConfig, ServerConfig, ServiceConfig,
    TokenConfig,
};
