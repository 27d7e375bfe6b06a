use biogate_ratelimiter::{BucketConfig, RateDecision, RateLimiter};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn admits_exactly_capacity_then_limits() {
    let limiter = RateLimiter::new(BucketConfig::new(5.0, 1.0).unwrap());
    for _ in 0..5 {
        assert_eq!(limiter.check("pubtator3"), RateDecision::Allowed);
    }
    assert_eq!(
        limiter.check("pubtator3"),
        RateDecision::Limited {
            retry_after: Duration::from_secs(1)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn admits_again_after_hint() {
    let limiter = RateLimiter::new(BucketConfig::new(1.0, 4.0).unwrap());
    assert!(limiter.check("ensembl").is_allowed());

    let RateDecision::Limited { retry_after } = limiter.check("ensembl") else {
        panic!("expected limit");
    };
    assert_eq!(retry_after, Duration::from_millis(250));

    tokio::time::advance(retry_after).await;
    assert!(limiter.check("ensembl").is_allowed());
}

#[tokio::test(start_paused = true)]
async fn refill_never_exceeds_capacity() {
    let limiter = RateLimiter::new(BucketConfig::new(3.0, 10.0).unwrap());
    assert!(limiter.check("mygene").is_allowed());

    tokio::time::advance(Duration::from_secs(3600)).await;
    let tokens = limiter.available("mygene").unwrap();
    assert!((tokens - 3.0).abs() < 1e-9, "{tokens}");

    for _ in 0..3 {
        assert!(limiter.check("mygene").is_allowed());
    }
    assert!(!limiter.check("mygene").is_allowed());
}

#[tokio::test(start_paused = true)]
async fn keys_are_independent_and_overridable() {
    let limiter = RateLimiter::new(BucketConfig::new(1.0, 1.0).unwrap())
        .with_override("clinicaltrials", BucketConfig::new(3.0, 1.0).unwrap());

    assert!(limiter.check("mygene").is_allowed());
    assert!(!limiter.check("mygene").is_allowed());
    assert!(limiter.check("myvariant").is_allowed());

    for _ in 0..3 {
        assert!(limiter.check("clinicaltrials").is_allowed());
    }
    assert!(!limiter.check("clinicaltrials").is_allowed());
    assert_eq!(limiter.len(), 3);
}
