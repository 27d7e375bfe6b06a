use super::fixed_policy;
use biogate_core::TransportError;
use biogate_retry::{retry, RetryPolicy};
use std::time::Duration;
use tokio::time::Instant;

#[test]
fn exponential_schedule() {
    let policy = RetryPolicy::builder()
        .initial_delay(Duration::from_millis(250))
        .max_delay(Duration::from_secs(5))
        .exponential_base(3.0)
        .jitter(false)
        .build()
        .unwrap();

    let delays: Vec<_> = (0..5).map(|n| policy.calculate_delay(n)).collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(250),
            Duration::from_millis(750),
            Duration::from_millis(2250),
            Duration::from_secs(5),
            Duration::from_secs(5),
        ]
    );
}

#[test]
fn base_one_is_constant() {
    let policy = RetryPolicy::builder()
        .initial_delay(Duration::from_millis(500))
        .exponential_base(1.0)
        .jitter(false)
        .build()
        .unwrap();
    assert!((0..20).all(|n| policy.calculate_delay(n) == Duration::from_millis(500)));
}

#[test]
fn jitter_stays_within_ten_percent_and_cap() {
    let policy = RetryPolicy::builder()
        .initial_delay(Duration::from_secs(1))
        .max_delay(Duration::from_millis(1050))
        .build()
        .unwrap();
    for _ in 0..200 {
        let first = policy.calculate_delay(0);
        assert!(first >= Duration::from_millis(899), "{first:?}");
        assert!(first <= Duration::from_millis(1050), "{first:?}");
        assert!(policy.calculate_delay(5) <= Duration::from_millis(1050));
    }
}

#[tokio::test(start_paused = true)]
async fn waits_between_attempts() {
    let policy = fixed_policy(4, 100);
    let started = Instant::now();

    let result: Result<(), _> = retry(&policy, |_| async {
        Err(TransportError::ReadTimeout("eutils".into()))
    })
    .await;

    assert!(result.is_err());
    // 100 + 200 + 400
    assert_eq!(started.elapsed(), Duration::from_millis(700));
}
