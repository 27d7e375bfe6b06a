//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - Opens exactly when a run of `failure_threshold` consecutive failures occurs
//! - Rejects every call while open
//! - Half-open admits at most `half_open_max_calls` trial calls

use biogate_circuitbreaker::{BreakerConfig, CircuitBreaker, CircuitState, Outcome};
use proptest::prelude::*;
use std::time::Duration;

fn breaker(threshold: u32, half_open_max_calls: u32, recovery: Duration) -> CircuitBreaker {
    CircuitBreaker::new(
        "property",
        BreakerConfig::builder()
            .failure_threshold(threshold)
            .recovery_timeout(recovery)
            .half_open_max_calls(half_open_max_calls)
            .build()
            .unwrap(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn opens_on_consecutive_failures(
        threshold in 1u32..=8,
        outcomes in prop::collection::vec(any::<bool>(), 1..40),
    ) {
        let breaker = breaker(threshold, 1, Duration::from_secs(3600));
        let mut run = 0;
        let mut open = false;

        for failed in outcomes {
            let permit = breaker.permit();
            if open {
                prop_assert!(permit.is_none());
                continue;
            }
            let permit = permit.expect("closed breaker must admit calls");
            permit.finish(if failed { Outcome::Failure } else { Outcome::Success });

            run = if failed { run + 1 } else { 0 };
            open = run >= threshold;
            let expected = if open { CircuitState::Open } else { CircuitState::Closed };
            prop_assert_eq!(breaker.state(), expected);
        }
    }

    #[test]
    fn half_open_limits_trial_calls(half_open_max_calls in 1u32..=5, callers in 1usize..=12) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(async {
            let breaker = breaker(1, half_open_max_calls, Duration::from_secs(10));
            breaker.record_failure();
            prop_assert_eq!(breaker.state(), CircuitState::Open);

            tokio::time::advance(Duration::from_secs(11)).await;
            let permits: Vec<_> = (0..callers).filter_map(|_| breaker.permit()).collect();
            prop_assert_eq!(permits.len(), callers.min(half_open_max_calls as usize));
            prop_assert_eq!(breaker.state(), CircuitState::HalfOpen);
            Ok(())
        })?;
    }
}
