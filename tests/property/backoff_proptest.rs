//! Property-based tests for retry backoff

use std::time::Duration;

use floatplan::offline::{BackoffStrategy, RetryDecision, RetryPolicy, MAX_RETRY_ATTEMPTS};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_backoff_is_monotonic_and_capped(n in 0u32..200) {
        let policy = RetryPolicy::default();
        let cap = Duration::from_secs(30);

        prop_assert!(policy.backoff(n) <= policy.backoff(n + 1));
        prop_assert!(policy.backoff(n) <= cap);
    }

    #[test]
    fn test_backoff_matches_formula(n in 0u32..12) {
        let policy = RetryPolicy::default();
        let expected = Duration::from_secs((1u64 << n).min(30));
        prop_assert_eq!(policy.backoff(n), expected);
    }

    #[test]
    fn test_custom_unit_scales(base_ms in 1u64..500, n in 0u32..20) {
        let base = Duration::from_millis(base_ms);
        let cap = base * 30;
        let strategy = BackoffStrategy::Exponential { base, cap };

        prop_assert!(strategy.delay(n) >= base);
        prop_assert!(strategy.delay(n) <= cap);
    }

    #[test]
    fn test_gives_up_exactly_at_ceiling(k in 0u32..50) {
        let decision = RetryPolicy::default().decide(k);
        if k >= MAX_RETRY_ATTEMPTS {
            prop_assert_eq!(decision, RetryDecision::GiveUp);
        } else {
            prop_assert!(matches!(decision, RetryDecision::RetryAfter(_)));
        }
    }
}
