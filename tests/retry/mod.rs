//! Retry controller tests.
//!
//! - backoff.rs: delay schedule and timing on a paused clock
//! - behavior.rs: attempt counting and error propagation
//! - events.rs: listeners
//! - layer.rs: tower middleware form

mod backoff;

use biogate_retry::RetryPolicy;
use std::time::Duration;

pub(crate) fn fixed_policy(max_attempts: u32, initial_ms: u64) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .initial_delay(Duration::from_millis(initial_ms))
        .max_delay(Duration::from_secs(10))
        .jitter(false)
        .build()
        .unwrap()
}
