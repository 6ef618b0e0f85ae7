//! Service Configuration Module
//!
//! Loads the pool service configuration from a TOML file, layered with an
//! optional environment file and `AMM__` prefixed environment variables.

use crate::engine_settings::{EngineSettings, SettingsError};
use crate::service::{events, server};
use anyhow::{Context, Result};
use config_crate::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use types::precision::{self, MAX_DECIMALS};
use types::TokenAddress;

/// Main service configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub engine: EngineSettings,

    /// Tokens known to the boundary (symbol, address, decimals)
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,

    /// Pools created at startup when no snapshot is restored
    #[serde(default)]
    pub pools: Vec<PoolConfig>,

    #[serde(default)]
    pub events: EventsConfig,

    /// Snapshot file read at startup and written on shutdown
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

/// HTTP listener settings
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Mount the operator pause/resume routes
    pub enable_admin: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: server::BIND_ADDRESS.to_string(),
            port: server::PORT,
            enable_cors: true,
            enable_admin: false,
        }
    }
}

/// Engine event delivery
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EventsConfig {
    /// Events buffered for the event log writer before new ones are dropped
    pub queue_size: usize,
    /// JSON-lines file receiving every engine event
    pub log_file: Option<PathBuf>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            queue_size: events::EVENT_QUEUE_SIZE,
            log_file: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Token metadata
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: TokenAddress,
    pub decimals: u8,
    /// Display-only USD price used for TVL and APR
    #[serde(default)]
    pub price_usd: Option<Decimal>,
}

/// Pool bootstrapped at startup
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PoolConfig {
    pub token_a: String,
    pub token_b: String,
    pub fee_bps: u32,
    #[serde(default)]
    pub farm: Option<FarmConfig>,
}

impl PoolConfig {
    fn label(&self) -> String {
        format!("{}/{}", self.token_a, self.token_b)
    }
}

/// Reward farm attached to a bootstrapped pool
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FarmConfig {
    pub reward_token: String,
    /// Decimal string in reward token units
    pub reward_per_second: String,
    #[serde(default = "default_pool_weight")]
    pub pool_weight: u32,
    #[serde(default)]
    pub end_time: Option<u64>,
}

fn default_pool_weight() -> u32 {
    1
}

impl ServiceConfig {
    /// Load configuration from files with environment overrides
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let base = base_path.unwrap_or(Path::new("config/services.toml"));

        let mut builder = Config::builder().add_source(File::from(base).required(true));

        if let Some(env) = environment {
            let env_file = base
                .parent()
                .unwrap_or(Path::new("config"))
                .join("environments")
                .join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        // AMM__SERVER__PORT=9000 style overrides
        builder = builder.add_source(
            Environment::with_prefix("AMM")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let config: ServiceConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    pub fn token(&self, symbol: &str) -> Option<&TokenConfig> {
        self.tokens.iter().find(|t| t.symbol == symbol)
    }

    /// Check cross references between tokens, pools and farms
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.engine.validate()?;
        if self.events.log_file.is_some() && self.events.queue_size == 0 {
            return Err(SettingsError::ZeroEventQueue);
        }

        let mut symbols = HashSet::new();
        for token in &self.tokens {
            if !symbols.insert(token.symbol.as_str()) {
                return Err(SettingsError::DuplicateToken(token.symbol.clone()));
            }
            if token.decimals > MAX_DECIMALS {
                return Err(SettingsError::UnsupportedDecimals {
                    symbol: token.symbol.clone(),
                    decimals: token.decimals,
                });
            }
        }

        for pool in &self.pools {
            for symbol in [&pool.token_a, &pool.token_b] {
                if self.token(symbol).is_none() {
                    return Err(SettingsError::UnknownToken(symbol.clone()));
                }
            }
            if pool.token_a == pool.token_b {
                return Err(SettingsError::IdenticalPoolTokens(pool.token_a.clone()));
            }
            if pool.fee_bps > self.engine.max_fee_bps {
                return Err(SettingsError::PoolFeeTooHigh {
                    token_a: pool.token_a.clone(),
                    token_b: pool.token_b.clone(),
                    fee_bps: pool.fee_bps,
                    max_fee_bps: self.engine.max_fee_bps,
                });
            }
            if let Some(farm) = &pool.farm {
                let reward = self
                    .token(&farm.reward_token)
                    .ok_or_else(|| SettingsError::UnknownToken(farm.reward_token.clone()))?;
                if let Err(e) = precision::parse_units(&farm.reward_per_second, reward.decimals) {
                    return Err(SettingsError::InvalidFarm {
                        pool: pool.label(),
                        reason: e.to_string(),
                    });
                }
                if farm.pool_weight == 0 {
                    return Err(SettingsError::InvalidFarm {
                        pool: pool.label(),
                        reason: "pool_weight must be greater than zero".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
