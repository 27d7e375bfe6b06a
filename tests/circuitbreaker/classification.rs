use biogate_circuitbreaker::{BreakerConfig, CircuitBreaker, CircuitState, Outcome};
use biogate_core::{ClassSet, ErrorKind, TransportError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[test]
fn default_expected_set() {
    let cb = CircuitBreaker::new("mychem", BreakerConfig::default());
    assert_eq!(cb.classify(&TransportError::status(500, "")), Outcome::Failure);
    assert_eq!(cb.classify(&TransportError::status(429, "")), Outcome::Failure);
    assert_eq!(cb.classify(&TransportError::status(408, "")), Outcome::Failure);
    assert_eq!(
        cb.classify(&TransportError::ReadTimeout("mychem.info".into())),
        Outcome::Failure
    );
    assert_eq!(cb.classify(&TransportError::status(404, "")), Outcome::Ignored);
    assert_eq!(cb.classify(&TransportError::Decode("eof".into())), Outcome::Ignored);
}

#[tokio::test]
async fn client_errors_do_not_trip() {
    let cb = CircuitBreaker::new(
        "mychem",
        BreakerConfig::builder().failure_threshold(2).build().unwrap(),
    );
    for _ in 0..10 {
        let result = cb
            .call(|| async { Err::<(), _>(TransportError::status(400, "bad query")) })
            .await;
        assert!(!result.unwrap_err().is_circuit_open());
    }
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[tokio::test]
async fn excluded_errors_bypass_bookkeeping() {
    let ignored = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ignored);
    let cb = CircuitBreaker::new(
        "openfda",
        BreakerConfig::builder()
            .failure_threshold(1)
            .excluded(ClassSet::new().with_statuses([503]))
            .on_ignored_error(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );

    let err = cb
        .call(|| async { Err::<(), _>(TransportError::status(503, "maintenance")) })
        .await
        .unwrap_err();
    assert_eq!(err.into_inner(), Some(TransportError::status(503, "maintenance")));
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(ignored.load(Ordering::SeqCst), 1);

    let _ = cb
        .call(|| async { Err::<(), _>(TransportError::status(500, "boom")) })
        .await;
    assert_eq!(cb.state(), CircuitState::Open);
}

#[tokio::test]
async fn custom_expected_set() {
    let cb = CircuitBreaker::new(
        "ensembl",
        BreakerConfig::builder()
            .failure_threshold(1)
            .recovery_timeout(Duration::from_secs(60))
            .expected(ClassSet::new().with_kinds([ErrorKind::Decode]))
            .build()
            .unwrap(),
    );
    let _ = cb
        .call(|| async { Err::<(), _>(TransportError::status(500, "boom")) })
        .await;
    assert_eq!(cb.state(), CircuitState::Closed);

    let _ = cb
        .call(|| async { Err::<(), _>(TransportError::Decode("truncated".into())) })
        .await;
    assert_eq!(cb.state(), CircuitState::Open);
}
