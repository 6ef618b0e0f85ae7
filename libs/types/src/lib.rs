//! # Pool Engine Types Library
//!
//! Identifier and precision types shared by the pool engine and its JSON
//! boundary.
//!
//! ## Design Philosophy
//!
//! - **Typed identifiers**: `PoolId`, `FarmId`, `TokenAddress` and `UserAddress`
//!   cannot be swapped by accident
//! - **No precision loss**: amounts are integers in smallest token units; decimal
//!   strings are converted exactly or rejected
//! - **Clear boundaries**: parsing and validation happen here, before values
//!   reach the engine
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{canonical_pair, precision, TokenAddress};
//!
//! let weth: TokenAddress = "0x7ceb23fd6bc0add59e62ac25578270cff1b9f619".parse().unwrap();
//! let usdc: TokenAddress = "0x2791bca1f2de4661ed88a30c99a7a9449aa84174".parse().unwrap();
//! let (token_a, token_b) = canonical_pair(weth, usdc);
//! assert!(token_a < token_b);
//!
//! let amount = precision::parse_units("12.5", 6).unwrap();
//! assert_eq!(amount, 12_500_000);
//! ```

pub mod common;
pub mod precision;

pub use common::errors::{PrecisionError, ValidationError};
pub use common::identifiers::{canonical_pair, FarmId, PoolId, TokenAddress, UserAddress};
