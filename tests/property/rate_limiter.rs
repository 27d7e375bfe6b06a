//! Property tests for the token bucket limiter.
//!
//! Invariants tested:
//! - A fresh bucket admits exactly its capacity in a burst
//! - Tokens never go negative or above capacity
//! - Buckets for different keys are independent

use biogate_ratelimiter::{BucketConfig, RateDecision, RateLimiter};
use proptest::prelude::*;
use std::time::Duration;
use tokio::runtime::Builder;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn burst_admits_exactly_capacity(capacity in 1u32..=50, rate in 0.001f64..=1.0, extra in 1u32..=20) {
        let limiter = RateLimiter::new(BucketConfig::new(capacity as f64, rate).unwrap());

        let allowed = (0..capacity + extra)
            .filter(|_| limiter.check("pubtator3").is_allowed())
            .count();
        prop_assert_eq!(allowed, capacity as usize);

        let tokens = limiter.available("pubtator3").unwrap();
        prop_assert!((0.0..1.0).contains(&tokens), "tokens = {tokens}");
    }

    #[test]
    fn tokens_stay_within_bounds(
        capacity in 1u32..=20,
        rate in 0.5f64..=50.0,
        steps in prop::collection::vec((0u64..=500, 0u32..=5), 1..30),
    ) {
        let rt = Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(async {
            let limiter = RateLimiter::new(BucketConfig::new(capacity as f64, rate).unwrap());
            limiter.check("clinicaltrials");
            for (sleep_ms, takes) in steps {
                tokio::time::advance(Duration::from_millis(sleep_ms)).await;
                for _ in 0..takes {
                    if let RateDecision::Limited { retry_after } = limiter.check("clinicaltrials") {
                        prop_assert!(retry_after > Duration::ZERO);
                    }
                }
                let tokens = limiter.available("clinicaltrials").unwrap();
                prop_assert!(tokens >= 0.0);
                prop_assert!(tokens <= capacity as f64 + 1e-9);
            }
            Ok(())
        })?;
    }

    #[test]
    fn keys_are_independent(capacity in 1u32..=10, drained in 0usize..=3) {
        let limiter = RateLimiter::new(BucketConfig::new(capacity as f64, 0.001).unwrap());
        let keys = ["mygene", "myvariant", "mychem", "openfda"];
        for key in &keys[..drained] {
            for _ in 0..capacity {
                limiter.check(key);
            }
        }
        for key in &keys[drained..] {
            prop_assert!(limiter.check(key).is_allowed());
        }
    }
}
