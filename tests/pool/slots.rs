use biogate_pool::{PoolConfig, PoolError, PoolManager, TlsVerify};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn slots_bound_in_flight_requests() {
    let manager = PoolManager::new(PoolConfig {
        max_connections: 2,
        ..PoolConfig::default()
    });
    let ctx = manager.context();
    let client = ctx
        .scope(async { manager.get_pool(&TlsVerify::default(), None).unwrap() })
        .await;

    let first = client.acquire().await.unwrap();
    let _second = client.acquire().await.unwrap();
    assert_eq!(client.available_slots(), 0);

    let waiting = tokio::time::timeout(Duration::from_secs(1), client.acquire()).await;
    assert!(waiting.is_err(), "third acquire should wait");

    drop(first);
    assert!(client.acquire().await.is_ok());
}

#[tokio::test]
async fn closed_client_rejects_acquire() {
    let manager = PoolManager::new(PoolConfig::default());
    let client = manager.get_pool(&TlsVerify::default(), None).unwrap();
    client.close();
    assert!(matches!(client.acquire().await, Err(PoolError::Closed)));
}
