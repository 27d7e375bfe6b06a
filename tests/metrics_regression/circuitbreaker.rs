//! Circuit breaker metrics regression tests

use super::helpers::*;
use serial_test::serial;

use biogate_circuitbreaker::{BreakerConfig, CircuitBreaker, Outcome};
use std::time::Duration;

#[tokio::test]
#[serial]
async fn circuitbreaker_call_metrics() {
    init_recorder();

    let breaker = CircuitBreaker::new("metrics_calls", BreakerConfig::default());
    breaker.permit().unwrap().finish(Outcome::Success);
    breaker.permit().unwrap().finish(Outcome::Failure);
    breaker.permit().unwrap().finish(Outcome::Ignored);

    assert_counter_exists("circuitbreaker_calls_total");
    assert_metric_has_label("circuitbreaker_calls_total", "breaker", "metrics_calls");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "success");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "failure");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "ignored");
}

#[tokio::test(start_paused = true)]
#[serial]
async fn circuitbreaker_transition_metrics() {
    init_recorder();

    let breaker = CircuitBreaker::new(
        "metrics_transitions",
        BreakerConfig::builder()
            .failure_threshold(1)
            .recovery_timeout(Duration::from_secs(5))
            .success_threshold(1)
            .build()
            .unwrap(),
    );

    breaker.permit().unwrap().finish(Outcome::Failure);
    assert!(breaker.permit().is_none());

    tokio::time::advance(Duration::from_secs(6)).await;
    breaker.permit().unwrap().finish(Outcome::Success);

    assert_counter_exists("circuitbreaker_transitions_total");
    assert_metric_has_label("circuitbreaker_transitions_total", "breaker", "metrics_transitions");
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "closed");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "open");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "half_open");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected");

    assert_gauge_exists("circuitbreaker_state");
    assert_metric_has_label("circuitbreaker_state", "breaker", "metrics_transitions");
}
