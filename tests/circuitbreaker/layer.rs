use super::config;
use biogate_circuitbreaker::{BreakerRegistry, CircuitBreakerError, CircuitBreakerLayer, CircuitState};
use biogate_core::TransportError;
use std::time::Duration;
use tower::{Layer, ServiceExt};

#[tokio::test]
async fn layer_shares_registry_breaker() {
    let registry = BreakerRegistry::new(config(2, Duration::from_secs(60), 1));
    let svc = CircuitBreakerLayer::from_registry(&registry, "pubtator3").layer(
        tower::service_fn(|fail: bool| async move {
            if fail {
                Err(TransportError::status(500, "upstream"))
            } else {
                Ok("ok")
            }
        }),
    );

    assert_eq!(svc.clone().oneshot(false).await.unwrap(), "ok");
    for _ in 0..2 {
        let err = svc.clone().oneshot(true).await.unwrap_err();
        assert!(matches!(err, CircuitBreakerError::Inner(_)));
    }
    assert_eq!(registry.get("pubtator3").unwrap().state(), CircuitState::Open);

    let err = svc.clone().oneshot(false).await.unwrap_err();
    assert!(err.is_circuit_open());
}
