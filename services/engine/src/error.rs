//! Engine error taxonomy
//!
//! Every failure belongs to one of three categories: rejected user input,
//! lock contention, or an invariant fault that trips the pool's circuit breaker.

use amm::MathError;
use thiserror::Error;
use types::{FarmId, PoolId, TokenAddress};

pub type Result<T> = std::result::Result<T, EngineError>;

/// How a caller should treat an [`EngineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request was valid to reject; nothing was mutated
    UserInput,
    /// Lock not acquired in time; retry with backoff
    Contention,
    /// Correctness bug; the pool has been paused
    InvariantFault,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("slippage exceeded: minimum {minimum}, actual {actual}")]
    SlippageExceeded { minimum: u128, actual: u128 },

    #[error("insufficient shares: requested {requested}, available {available}")]
    InsufficientShares { requested: u128, available: u128 },

    #[error("deadline {deadline} expired at {now}")]
    DeadlineExpired { deadline: u64, now: u64 },

    #[error("pool for pair {token_a}/{token_b} already exists as {existing}")]
    DuplicatePool {
        token_a: TokenAddress,
        token_b: TokenAddress,
        existing: PoolId,
    },

    #[error("insufficient liquidity in {pool_id}: {reason}")]
    InsufficientLiquidity {
        pool_id: PoolId,
        reason: &'static str,
    },

    #[error("{0} not found")]
    PoolNotFound(PoolId),

    #[error("{0} not found")]
    FarmNotFound(FarmId),

    #[error("{pool_id} already has farm {existing}")]
    DuplicateFarm { pool_id: PoolId, existing: FarmId },

    #[error("invalid amount: {0}")]
    InvalidAmount(&'static str),

    #[error("invalid pair: both sides are {0}")]
    InvalidPair(TokenAddress),

    #[error("fee {fee_bps} bps exceeds maximum {max_fee_bps} bps")]
    InvalidFee { fee_bps: u32, max_fee_bps: u32 },

    #[error("no lock tier for {0} days")]
    InvalidLockPeriod(u32),

    #[error("the zero address cannot hold positions")]
    InvalidUser,

    #[error("stake locked until {lock_end} (now {now})")]
    LockActive { lock_end: u64, now: u64 },

    #[error("token {token} is not part of {pool_id}")]
    UnknownToken {
        pool_id: PoolId,
        token: TokenAddress,
    },

    #[error("arithmetic overflow: {0}")]
    Overflow(&'static str),

    #[error("{0} is paused")]
    PoolPaused(PoolId),

    #[error("{0} is busy, retry later")]
    Busy(PoolId),

    #[error("invariant violated in {pool_id}: {reason}")]
    InvariantViolated { pool_id: PoolId, reason: String },

    #[error("reserve underflow in {pool_id}: {field}")]
    ReserveUnderflow {
        pool_id: PoolId,
        field: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Busy(_) => ErrorCategory::Contention,
            EngineError::InvariantViolated { .. }
            | EngineError::ReserveUnderflow { .. }
            | EngineError::DivisionByZero => ErrorCategory::InvariantFault,
            _ => ErrorCategory::UserInput,
        }
    }

    pub fn is_fault(&self) -> bool {
        self.category() == ErrorCategory::InvariantFault
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Contention
    }
}

impl From<MathError> for EngineError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::Overflow(context) => EngineError::Overflow(context),
            MathError::DivisionByZero => EngineError::DivisionByZero,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            EngineError::Busy(PoolId::new(1)).category(),
            ErrorCategory::Contention
        );
        assert!(EngineError::DivisionByZero.is_fault());
        assert!(EngineError::ReserveUnderflow {
            pool_id: PoolId::new(1),
            field: "reserve_a"
        }
        .is_fault());
        assert_eq!(
            EngineError::SlippageExceeded {
                minimum: 2,
                actual: 1
            }
            .category(),
            ErrorCategory::UserInput
        );
        assert_eq!(
            EngineError::PoolPaused(PoolId::new(1)).category(),
            ErrorCategory::UserInput
        );
    }

    #[test]
    fn test_math_error_mapping() {
        assert_eq!(
            EngineError::from(MathError::DivisionByZero),
            EngineError::DivisionByZero
        );
        assert_eq!(
            EngineError::from(MathError::Overflow("emission")),
            EngineError::Overflow("emission")
        );
    }
}
