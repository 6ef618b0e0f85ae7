//! Error types for identifier validation and precision conversion
//!
//! Every value that crosses the JSON boundary is validated here before it
//! reaches the engine, so the engine itself only ever sees well-formed
//! identifiers and integer amounts in smallest token units.

use thiserror::Error;

/// Errors that can occur during typed ID and address validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// ID value is null/zero when non-null required
    #[error("ID cannot be null/zero")]
    NullId,

    /// Address string is not a 20-byte hex value
    #[error("Invalid address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    /// ID string is not an unsigned integer
    #[error("Invalid identifier '{input}'")]
    InvalidId { input: String },
}

/// Errors that can occur while converting between decimal strings and base units
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrecisionError {
    /// Input is not a decimal number
    #[error("Invalid decimal string: '{input}' - expected numeric format")]
    InvalidDecimal { input: String },

    /// Negative amounts are never valid token quantities
    #[error("Negative amount not allowed: '{input}'")]
    Negative { input: String },

    /// More fractional digits than the token can represent
    #[error("Amount '{input}' has more than {decimals} fractional digits")]
    TooManyDecimals { input: String, decimals: u8 },

    /// Scaled value does not fit in 128 bits
    #[error("Amount '{input}' overflows 128-bit base units")]
    Overflow { input: String },

    /// Token declares more decimals than base units can carry
    #[error("Unsupported token decimals: {0}")]
    UnsupportedDecimals(u8),

    /// Percentage outside 0..=100
    #[error("Invalid percentage '{input}': expected a value between 0 and 100")]
    InvalidPercentage { input: String },
}
