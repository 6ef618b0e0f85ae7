//! AMM Math Property Tests
//!
//! These tests validate properties that must hold for any reserves and trade
//! sizes, independent of specific pool conditions.

use amm::{ConstantProductMath, RewardMath};
use proptest::prelude::*;

prop_compose! {
    fn valid_reserves()
        (reserve in 1_000u128..1_000_000_000_000_000_000_000u128) -> u128 {
        reserve
    }
}

prop_compose! {
    fn valid_fee()
        (fee_bps in 0u32..1_000u32) -> u32 {
        fee_bps
    }
}

proptest! {
    #[test]
    fn prop_swap_never_decreases_invariant(
        reserve_in in valid_reserves(),
        reserve_out in valid_reserves(),
        amount_in in 1u128..1_000_000_000_000_000_000u128,
        fee_bps in valid_fee(),
    ) {
        let quote = ConstantProductMath::quote_exact_in(amount_in, reserve_in, reserve_out, fee_bps)
            .expect("inputs stay far from u128 limits");
        prop_assert!(quote.amount_out < reserve_out);

        let before = ConstantProductMath::invariant(reserve_in, reserve_out);
        let after = ConstantProductMath::invariant(reserve_in + amount_in, reserve_out - quote.amount_out);
        prop_assert!(after >= before);
    }

    #[test]
    fn prop_output_monotonic_in_input(
        reserve_in in valid_reserves(),
        reserve_out in valid_reserves(),
        amount_in in 1u128..1_000_000_000_000u128,
        extra in 0u128..1_000_000u128,
        fee_bps in valid_fee(),
    ) {
        let smaller = ConstantProductMath::quote_exact_in(amount_in, reserve_in, reserve_out, fee_bps).unwrap();
        let larger = ConstantProductMath::quote_exact_in(amount_in + extra, reserve_in, reserve_out, fee_bps).unwrap();
        prop_assert!(larger.amount_out >= smaller.amount_out);
        prop_assert!(larger.fee >= smaller.fee);
    }

    #[test]
    fn prop_burn_never_exceeds_reserves(
        reserve_a in valid_reserves(),
        reserve_b in valid_reserves(),
        total in 1u128..1_000_000_000_000_000_000u128,
        shares_ppm in 0u128..=1_000_000u128,
    ) {
        let shares = total / 1_000_000 * shares_ppm;
        let (a, b) = ConstantProductMath::amounts_for_shares(shares, reserve_a, reserve_b, total).unwrap();
        prop_assert!(a <= reserve_a);
        prop_assert!(b <= reserve_b);
    }

    #[test]
    fn prop_reward_split_within_emission(
        elapsed in 1u64..(365 * 86_400),
        reward_per_second in 1u128..1_000_000_000_000_000u128,
        pool_weight in 1u32..100u32,
        weights in proptest::collection::vec(1u128..1_000_000_000_000u128, 1..8),
    ) {
        let total: u128 = weights.iter().sum();
        let increment = RewardMath::acc_increment(elapsed, reward_per_second, pool_weight, total).unwrap();
        let paid: u128 = weights
            .iter()
            .map(|w| RewardMath::pending(*w, increment, 0).unwrap())
            .sum();
        let emitted = RewardMath::emission(elapsed, reward_per_second, pool_weight).unwrap();
        prop_assert!(paid <= emitted);
    }
}
