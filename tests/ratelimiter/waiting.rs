use biogate_ratelimiter::{BucketConfig, RateLimiter, RateLimiterEvent};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn acquire_waits_for_hint() {
    let limiter = RateLimiter::new(BucketConfig::new(1.0, 2.0).unwrap());
    limiter.acquire("openfda").await.unwrap();

    let started = Instant::now();
    limiter.acquire("openfda").await.unwrap();
    assert_eq!(started.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn fail_fast_with_zero_wait() {
    let limited = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&limited);
    let limiter = RateLimiter::new(BucketConfig::new(1.0, 1.0).unwrap())
        .on_limited(move |key, retry_after| seen.lock().unwrap().push((key.to_string(), retry_after)));

    limiter.acquire_within("mychem", Duration::ZERO).await.unwrap();
    let err = limiter
        .acquire_within("mychem", Duration::ZERO)
        .await
        .unwrap_err();

    assert_eq!(err.retry_after(), Duration::from_secs(1));
    assert_eq!(
        *limited.lock().unwrap(),
        vec![("mychem".to_string(), Duration::from_secs(1))]
    );
}

#[tokio::test(start_paused = true)]
async fn bounded_wait_reports_time_waited() {
    let limiter = RateLimiter::new(BucketConfig::new(1.0, 1.0).unwrap());
    limiter.acquire_within("cbioportal", Duration::from_secs(2)).await.unwrap();

    let waited = limiter
        .acquire_within("cbioportal", Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(waited, Duration::from_secs(1));

    // The next token is a full second away.
    let err = limiter
        .acquire_within("cbioportal", Duration::from_millis(500))
        .await
        .unwrap_err();
    assert_eq!(err.retry_after(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn allowed_events_carry_wait() {
    let waits = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&waits);
    let limiter = RateLimiter::new(BucketConfig::new(1.0, 10.0).unwrap()).on_event(move |event| {
        if let RateLimiterEvent::Allowed { waited, .. } = event {
            seen.lock().unwrap().push(*waited);
        }
    });

    limiter.acquire("ensembl").await.unwrap();
    limiter.acquire("ensembl").await.unwrap();
    assert_eq!(
        *waits.lock().unwrap(),
        vec![Duration::ZERO, Duration::from_millis(100)]
    );
}
