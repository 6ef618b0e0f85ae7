//! # Typed Identifiers
//!
//! Zero-cost wrappers that keep pool, farm, token and user identifiers from
//! being mixed up at compile time.
//!
//! - **Typed IDs** (`PoolId`, `FarmId`) wrap a `u64` assigned by the engine and
//!   serialize as a bare number.
//! - **Addresses** (`TokenAddress`, `UserAddress`) wrap a 20-byte value and
//!   serialize as a `0x`-prefixed lowercase hex string.
//!
//! ```rust
//! use types::{PoolId, TokenAddress};
//!
//! let usdc: TokenAddress = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".parse().unwrap();
//! let pool = PoolId::new(1);
//! assert_eq!(pool.inner(), 1);
//! assert_eq!(usdc.to_string(), "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
//! ```

use crate::common::errors::ValidationError;
use std::str::FromStr;

/// Macro for engine-assigned numeric identifiers
macro_rules! define_typed_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create a new typed ID
            #[inline(always)]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Create a new typed ID, rejecting zero
            #[inline]
            pub fn new_validated(id: u64) -> Result<Self, ValidationError> {
                if id == 0 {
                    return Err(ValidationError::NullId);
                }
                Ok(Self(id))
            }

            /// Extract the inner u64 value
            #[inline(always)]
            pub const fn inner(&self) -> u64 {
                self.0
            }

            /// Generate next sequential ID
            #[inline(always)]
            pub fn next(&self) -> Self {
                Self(self.0.wrapping_add(1))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<u64> for $name {
            #[inline(always)]
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            #[inline(always)]
            fn from(id: $name) -> u64 {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let id = s
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ValidationError::InvalidId { input: s.to_string() })?;
                Self::new_validated(id)
            }
        }

        // Serializes as raw u64
        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                u64::deserialize(deserializer).map(Self)
            }
        }
    };
}

/// Macro for 20-byte account and token addresses
macro_rules! define_address {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(pub [u8; 20]);

        impl $name {
            /// The all-zero address
            pub const ZERO: Self = Self([0u8; 20]);

            #[inline(always)]
            pub const fn from_bytes(bytes: [u8; 20]) -> Self {
                Self(bytes)
            }

            #[inline(always)]
            pub const fn as_bytes(&self) -> &[u8; 20] {
                &self.0
            }

            /// Short form for log lines (`0x1234abcd…`)
            pub fn short(&self) -> String {
                format!("0x{}…", &hex::encode(self.0)[..8])
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                let digits = trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                    .unwrap_or(trimmed);
                if digits.len() != 40 {
                    return Err(ValidationError::InvalidAddress {
                        input: s.to_string(),
                        reason: format!("expected 40 hex digits, got {}", digits.len()),
                    });
                }
                let mut bytes = [0u8; 20];
                hex::decode_to_slice(digits, &mut bytes).map_err(|e| {
                    ValidationError::InvalidAddress {
                        input: s.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Self(bytes))
            }
        }

        impl From<[u8; 20]> for $name {
            fn from(bytes: [u8; 20]) -> Self {
                Self(bytes)
            }
        }

        // Serializes as 0x-prefixed hex
        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

define_typed_id! {
    /// Liquidity pool identifier, assigned sequentially at pool creation
    PoolId
}

define_typed_id! {
    /// Reward farm identifier, assigned sequentially at farm creation
    FarmId
}

define_address! {
    /// ERC-20 style token contract address
    TokenAddress
}

define_address! {
    /// Account address of a liquidity provider or trader
    UserAddress
}

/// Sort two token addresses into the canonical `(token_a, token_b)` order.
///
/// Pools are identified by an unordered pair; the lower address is always
/// `token_a`.
pub fn canonical_pair(x: TokenAddress, y: TokenAddress) -> (TokenAddress, TokenAddress) {
    if x <= y {
        (x, y)
    } else {
        (y, x)
    }
}
