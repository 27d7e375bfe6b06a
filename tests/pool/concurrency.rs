use biogate_pool::{PoolConfig, PoolManager, TlsVerify};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_get_pool_yields_one_instance() {
    let manager = PoolManager::new(PoolConfig::default());
    let ctx = manager.context();

    let clients = ctx
        .scope(async {
            let mut handles = Vec::new();
            for _ in 0..32 {
                let manager = Arc::clone(&manager);
                let ctx = ctx.clone();
                handles.push(tokio::spawn(async move {
                    ctx.scope(async { manager.get_pool(&TlsVerify::default(), None).unwrap() })
                        .await
                }));
            }
            let mut clients = Vec::new();
            for handle in handles {
                clients.push(handle.await.unwrap());
            }
            clients
        })
        .await;

    assert!(clients.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(manager.pool_count(), 1);
}

#[tokio::test]
async fn verify_settings_get_separate_clients() {
    let manager = PoolManager::new(PoolConfig::default());
    let ctx = manager.context();
    ctx.scope(async {
        let strict = manager.get_pool(&TlsVerify::Enabled(true), None).unwrap();
        let lax = manager.get_pool(&TlsVerify::Enabled(false), None).unwrap();
        assert!(!Arc::ptr_eq(&strict, &lax));
        assert_eq!(lax.verify(), &TlsVerify::Enabled(false));
    })
    .await;
    assert_eq!(manager.pool_count(), 2);
}
