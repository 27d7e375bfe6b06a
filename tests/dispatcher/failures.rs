use super::{ScriptedTransport, builder, fast_retry};
use biogate::circuitbreaker::{BreakerConfig, BreakerRegistry, CircuitState};
use biogate::retry::RetryPolicy;
use biogate::{ErrorReason, NETWORK_ERROR, RequestDescriptor, TransportError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn variant_request() -> RequestDescriptor {
    RequestDescriptor::get("https://myvariant.info/v1/query")
        .payload(json!({"q": "rs113488022"}))
        .endpoint_key("myvariant_query")
        .build()
}

fn timeout() -> Result<serde_json::Value, TransportError> {
    Err(TransportError::ConnectTimeout("connect timed out".into()))
}

#[tokio::test(start_paused = true)]
async fn transient_failures_then_success() {
    let transport = ScriptedTransport::ok(json!({"hits": [{"_id": "chr7:g.140453136A>T"}]}))
        .then(timeout())
        .then(timeout())
        .then(timeout());
    let dispatcher = builder(&transport).retry_policy(fast_retry(4)).build();

    let body = dispatcher.dispatch(&variant_request()).await.unwrap();
    assert_eq!(body["hits"][0]["_id"], "chr7:g.140453136A>T");
    assert_eq!(transport.calls(), 4);

    // One logical call, one breaker success.
    let breaker = dispatcher.breakers().get("myvariant").unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_become_network_error() {
    let transport = ScriptedTransport::new(Err(TransportError::status(503, "maintenance")));
    let dispatcher = builder(&transport).retry_policy(fast_retry(3)).build();

    let err = dispatcher.dispatch(&variant_request()).await.unwrap_err();
    assert_eq!(err.code, NETWORK_ERROR);
    assert_eq!(err.reason, ErrorReason::NetworkError);
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn non_retryable_status_is_passed_through() {
    let transport = ScriptedTransport::new(Err(TransportError::status(404, r#"{"error":"no hits"}"#)));
    let dispatcher = builder(&transport).retry_policy(fast_retry(5)).build();

    let err = dispatcher.dispatch(&variant_request()).await.unwrap_err();
    assert_eq!(err.code, 404);
    assert_eq!(err.reason, ErrorReason::UpstreamStatus);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn per_request_policy_overrides_default() {
    let transport = ScriptedTransport::new(timeout());
    let dispatcher = builder(&transport).retry_policy(fast_retry(5)).build();

    let request = RequestDescriptor::get("https://rest.ensembl.org/info/ping")
        .retry_policy(RetryPolicy::no_retry())
        .build();
    let err = dispatcher.dispatch(&request).await.unwrap_err();
    assert_eq!(err.code, NETWORK_ERROR);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_failures_open_the_domain_breaker() {
    let transport = ScriptedTransport::new(Err(TransportError::Connection("refused".into())));
    let breakers = Arc::new(BreakerRegistry::new(
        BreakerConfig::builder()
            .failure_threshold(2)
            .recovery_timeout(Duration::from_secs(60))
            .build()
            .unwrap(),
    ));
    let dispatcher = builder(&transport)
        .breakers(Arc::clone(&breakers))
        .retry_policy(RetryPolicy::no_retry())
        .build();

    for _ in 0..2 {
        let err = dispatcher.dispatch(&variant_request()).await.unwrap_err();
        assert_eq!(err.reason, ErrorReason::NetworkError);
    }
    let err = dispatcher.dispatch(&variant_request()).await.unwrap_err();
    assert_eq!(err.code, 503);
    assert_eq!(err.reason, ErrorReason::CircuitOpen);
    assert_eq!(transport.calls(), 2);

    // Other domains are unaffected.
    dispatcher
        .dispatch(&RequestDescriptor::get("https://mychem.info/v1/query").build())
        .await
        .unwrap_err();
    assert_eq!(transport.calls(), 3);
    assert_eq!(
        breakers.states(),
        vec![
            ("mychem.info".to_string(), CircuitState::Closed),
            ("myvariant".to_string(), CircuitState::Open),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn breaker_recovers_after_timeout() {
    let transport = ScriptedTransport::ok(json!({"ok": true}))
        .then(Err(TransportError::Connection("reset".into())));
    let breakers = Arc::new(BreakerRegistry::new(
        BreakerConfig::builder()
            .failure_threshold(1)
            .recovery_timeout(Duration::from_secs(30))
            .success_threshold(1)
            .build()
            .unwrap(),
    ));
    let dispatcher = builder(&transport)
        .breakers(Arc::clone(&breakers))
        .retry_policy(RetryPolicy::no_retry())
        .build();

    assert!(dispatcher.dispatch(&variant_request()).await.is_err());
    assert_eq!(
        dispatcher.dispatch(&variant_request()).await.unwrap_err().reason,
        ErrorReason::CircuitOpen
    );

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(dispatcher.dispatch(&variant_request()).await.unwrap(), json!({"ok": true}));
    assert_eq!(breakers.get("myvariant").unwrap().state(), CircuitState::Closed);
}

#[tokio::test]
async fn client_errors_do_not_trip_the_breaker() {
    let transport = ScriptedTransport::new(Err(TransportError::status(400, "bad query")));
    let breakers = Arc::new(BreakerRegistry::new(
        BreakerConfig::builder().failure_threshold(1).build().unwrap(),
    ));
    let dispatcher = builder(&transport).breakers(Arc::clone(&breakers)).build();

    for _ in 0..3 {
        assert_eq!(dispatcher.dispatch(&variant_request()).await.unwrap_err().code, 400);
    }
    assert_eq!(transport.calls(), 3);
    assert_eq!(breakers.get("myvariant").unwrap().state(), CircuitState::Closed);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let transport = ScriptedTransport::ok(json!({"hits": [1]}))
        .then(Err(TransportError::status(404, "missing")));
    let dispatcher = builder(&transport).build();
    let request = RequestDescriptor::get("https://mychem.info/v1/query")
        .cache_ttl(Duration::from_secs(60))
        .build();

    assert!(dispatcher.dispatch(&request).await.is_err());
    assert!(dispatcher.cache().is_empty());
    assert_eq!(dispatcher.dispatch(&request).await.unwrap(), json!({"hits": [1]}));
}
