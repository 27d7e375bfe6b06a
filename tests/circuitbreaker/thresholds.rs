use super::config;
use biogate_circuitbreaker::{CircuitBreaker, CircuitState};
use biogate_core::TransportError;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn unavailable() -> Result<(), TransportError> {
    Err(TransportError::status(503, "Service Unavailable"))
}

#[tokio::test]
async fn opens_exactly_at_threshold() {
    let cb = CircuitBreaker::new("clinicaltrials", config(3, Duration::from_secs(60), 1));

    for _ in 0..2 {
        let _ = cb.call(|| async { unavailable() }).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }
    let _ = cb.call(|| async { unavailable() }).await;
    assert_eq!(cb.state(), CircuitState::Open);
}

#[tokio::test]
async fn success_resets_failure_count() {
    let cb = CircuitBreaker::new("clinicaltrials", config(3, Duration::from_secs(60), 1));

    for _ in 0..2 {
        let _ = cb.call(|| async { unavailable() }).await;
    }
    cb.call(|| async { Ok::<_, TransportError>(()) }).await.unwrap();
    assert_eq!(cb.metrics().consecutive_failures, 0);

    for _ in 0..2 {
        let _ = cb.call(|| async { unavailable() }).await;
    }
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[tokio::test]
async fn open_circuit_never_calls_operation() {
    let cb = CircuitBreaker::new("openfda", config(1, Duration::from_secs(60), 1));
    let _ = cb.call(|| async { unavailable() }).await;
    assert_eq!(cb.state(), CircuitState::Open);

    let calls = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let calls = Arc::clone(&calls);
        let result = cb
            .call(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TransportError>(())
            })
            .await;
        assert!(result.unwrap_err().is_circuit_open());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn threshold_of_one() {
    let cb = CircuitBreaker::new("mygene", config(1, Duration::from_secs(60), 1));
    let _ = cb
        .call(|| async { Err::<(), _>(TransportError::ConnectTimeout("mygene.info".into())) })
        .await;
    assert_eq!(cb.state(), CircuitState::Open);
}
