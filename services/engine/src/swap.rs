//! Swap Engine
//!
//! Exact-input swaps against a constant-product pool. Quotes are always
//! recomputed from the reserves held under the pool lock; callers only supply
//! their slippage bound and deadline.

use crate::error::{EngineError, Result};
use crate::ledger::{Pool, PoolDelta, PoolShard};
use amm::{ConstantProductMath, SwapQuote};
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::{PoolId, TokenAddress, UserAddress};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub user: UserAddress,
    pub pool_id: PoolId,
    pub token_in: TokenAddress,
    pub amount_in: u128,
    pub min_amount_out: u128,
    /// Unix seconds; the swap fails if the clock is past this when it executes
    pub deadline: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapReceipt {
    pub pool_id: PoolId,
    pub user: UserAddress,
    pub token_in: TokenAddress,
    pub token_out: TokenAddress,
    pub amount_in: u128,
    pub amount_out: u128,
    pub fee: u128,
    pub price_impact_bps: u32,
    /// Reserves after the swap
    pub reserve_a: u128,
    pub reserve_b: u128,
    pub timestamp: u64,
}

pub struct SwapEngine;

impl SwapEngine {
    /// Price an exact-input swap against the pool's current reserves
    pub fn quote(pool: &Pool, token_in: &TokenAddress, amount_in: u128) -> Result<SwapQuote> {
        let (reserve_in, reserve_out, _) = pool.oriented(token_in)?;
        if amount_in == 0 {
            return Err(EngineError::InvalidAmount("amount in must be positive"));
        }
        if reserve_in == 0 || reserve_out == 0 {
            return Err(EngineError::InsufficientLiquidity {
                pool_id: pool.id,
                reason: "pool has no reserves",
            });
        }

        let quote = ConstantProductMath::quote_exact_in(amount_in, reserve_in, reserve_out, pool.fee_bps)?;
        if quote.amount_out == 0 {
            return Err(EngineError::InsufficientLiquidity {
                pool_id: pool.id,
                reason: "output rounds to zero",
            });
        }
        if quote.amount_out >= reserve_out {
            return Err(EngineError::InsufficientLiquidity {
                pool_id: pool.id,
                reason: "output would drain the pool",
            });
        }
        Ok(quote)
    }

    /// Re-quote and settle a swap. `now` must be read after the pool lock is
    /// held so queued requests expire instead of executing at a stale price.
    pub fn execute(shard: &mut PoolShard, request: &SwapRequest, now: u64) -> Result<SwapReceipt> {
        if now > request.deadline {
            return Err(EngineError::DeadlineExpired {
                deadline: request.deadline,
                now,
            });
        }

        let pool = &shard.pool;
        let quote = Self::quote(pool, &request.token_in, request.amount_in)?;
        if quote.amount_out < request.min_amount_out {
            return Err(EngineError::SlippageExceeded {
                minimum: request.min_amount_out,
                actual: quote.amount_out,
            });
        }

        let (reserve_in, reserve_out, a_in) = pool.oriented(&request.token_in)?;
        let new_in = reserve_in
            .checked_add(request.amount_in)
            .ok_or(EngineError::Overflow("reserve after swap"))?;
        let new_out = reserve_out - quote.amount_out;
        let before = ConstantProductMath::invariant(reserve_in, reserve_out);
        let after = ConstantProductMath::invariant(new_in, new_out);
        if after < before {
            return Err(EngineError::InvariantViolated {
                pool_id: pool.id,
                reason: format!("k decreased from {} to {}", before, after),
            });
        }

        let amount_in = PoolDelta::signed(request.amount_in, "swap input")?;
        let amount_out = PoolDelta::signed(quote.amount_out, "swap output")?;
        let delta = if a_in {
            PoolDelta {
                reserve_a: amount_in,
                reserve_b: -amount_out,
                fee_a: quote.fee,
                ..PoolDelta::default()
            }
        } else {
            PoolDelta {
                reserve_a: -amount_out,
                reserve_b: amount_in,
                fee_b: quote.fee,
                ..PoolDelta::default()
            }
        };
        let token_out = pool.other_token(a_in);

        shard.apply_delta(&delta)?;
        shard.stats.record(now, a_in, request.amount_in, quote.fee);

        debug!(
            pool_id = %shard.pool.id,
            amount_in = request.amount_in,
            amount_out = quote.amount_out,
            fee = quote.fee,
            "swap settled"
        );

        Ok(SwapReceipt {
            pool_id: shard.pool.id,
            user: request.user,
            token_in: request.token_in,
            token_out,
            amount_in: request.amount_in,
            amount_out: quote.amount_out,
            fee: quote.fee,
            price_impact_bps: quote.price_impact_bps,
            reserve_a: shard.pool.reserve_a,
            reserve_b: shard.pool.reserve_b,
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(byte: u8) -> TokenAddress {
        TokenAddress::from_bytes([byte; 20])
    }

    fn shard(reserve_a: u128, reserve_b: u128, fee_bps: u32) -> PoolShard {
        PoolShard::new(Pool {
            id: PoolId::new(1),
            token_a: token(1),
            token_b: token(2),
            fee_bps,
            reserve_a,
            reserve_b,
            total_lp_supply: if reserve_a == 0 { 0 } else { 1_000 },
            cumulative_fee_a: 0,
            cumulative_fee_b: 0,
            paused: false,
            created_at: 0,
        })
    }

    fn request(token_in: TokenAddress, amount_in: u128, min_amount_out: u128) -> SwapRequest {
        SwapRequest {
            user: UserAddress::from_bytes([7; 20]),
            pool_id: PoolId::new(1),
            token_in,
            amount_in,
            min_amount_out,
            deadline: 100,
        }
    }

    #[test]
    fn test_quote_rejects_bad_input() {
        let shard = shard(1_000, 1_000, 30);
        assert!(matches!(
            SwapEngine::quote(&shard.pool, &token(3), 10).unwrap_err(),
            EngineError::UnknownToken { .. }
        ));
        assert_eq!(
            SwapEngine::quote(&shard.pool, &token(1), 0).unwrap_err(),
            EngineError::InvalidAmount("amount in must be positive")
        );
        // 1 unit in after fee rounds the output to zero
        assert!(matches!(
            SwapEngine::quote(&shard.pool, &token(1), 1).unwrap_err(),
            EngineError::InsufficientLiquidity { .. }
        ));
        let empty = self::shard(0, 0, 30);
        assert!(matches!(
            SwapEngine::quote(&empty.pool, &token(1), 10).unwrap_err(),
            EngineError::InsufficientLiquidity { .. }
        ));
    }

    #[test]
    fn test_execute_b_to_a() {
        let mut shard = shard(1_000_000, 1_000_000, 30);
        let receipt = SwapEngine::execute(&mut shard, &request(token(2), 1_000, 990), 50).unwrap();
        assert_eq!(receipt.token_out, token(1));
        assert_eq!(receipt.amount_out, 996);
        assert_eq!(receipt.reserve_a, 1_000_000 - 996);
        assert_eq!(receipt.reserve_b, 1_001_000);
        assert_eq!(shard.pool.cumulative_fee_b, 3);
        assert_eq!(shard.pool.cumulative_fee_a, 0);
        assert_eq!(shard.stats.totals(50).volume_b, 1_000);
    }

    #[test]
    fn test_slippage_and_deadline_leave_pool_untouched() {
        let mut shard = shard(1_000_000, 1_000_000, 30);
        let before = shard.pool.clone();

        assert_eq!(
            SwapEngine::execute(&mut shard, &request(token(1), 1_000, 997), 50).unwrap_err(),
            EngineError::SlippageExceeded {
                minimum: 997,
                actual: 996
            }
        );
        assert_eq!(
            SwapEngine::execute(&mut shard, &request(token(1), 1_000, 0), 101).unwrap_err(),
            EngineError::DeadlineExpired {
                deadline: 100,
                now: 101
            }
        );
        assert_eq!(shard.pool, before);
        assert_eq!(shard.stats.totals(50).swaps, 0);
    }

    #[test]
    fn test_deadline_is_inclusive() {
        let mut shard = shard(1_000_000, 1_000_000, 30);
        assert!(SwapEngine::execute(&mut shard, &request(token(1), 1_000, 0), 100).is_ok());
    }
}
