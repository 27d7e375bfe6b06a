//! Retry metrics regression tests

use super::helpers::*;
use serial_test::serial;

use biogate_core::TransportError;
use biogate_retry::{Retrier, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .initial_delay(Duration::from_millis(10))
        .jitter(false)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
#[serial]
async fn retry_success_metrics() {
    init_recorder();

    let calls = AtomicU32::new(0);
    let retrier = Retrier::new("metrics_retry_success", policy(3));
    let result = retrier
        .run(|_| async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TransportError::Connection("reset".into()))
            } else {
                Ok(())
            }
        })
        .await;
    assert!(result.is_ok());

    assert_counter_exists("retry_attempts_total");
    assert_metric_has_label("retry_attempts_total", "name", "metrics_retry_success");
    assert_counter_exists("retry_calls_total");
    assert_metric_has_label("retry_calls_total", "outcome", "success");
}

#[tokio::test(start_paused = true)]
#[serial]
async fn retry_exhausted_metrics() {
    init_recorder();

    let retrier = Retrier::new("metrics_retry_exhausted", policy(2));
    let result: Result<(), _> = retrier
        .run(|_| async { Err(TransportError::status(503, "unavailable")) })
        .await;
    assert!(result.is_err());

    assert_metric_has_label("retry_calls_total", "name", "metrics_retry_exhausted");
    assert_metric_has_label("retry_calls_total", "outcome", "exhausted");
}
