use biogate_pool::{ExecutionContext, PoolConfig, PoolError, PoolManager, TlsVerify};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::test]
async fn separate_contexts_do_not_share_clients() {
    let manager = PoolManager::new(PoolConfig::default());
    let first = manager.context();
    let second = manager.context();
    assert_ne!(first.id(), second.id());

    let a = first
        .scope(async { manager.get_pool(&TlsVerify::default(), None).unwrap() })
        .await;
    let b = second
        .scope(async { manager.get_pool(&TlsVerify::default(), None).unwrap() })
        .await;
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(manager.context_count(), 2);

    drop(first);
    assert!(a.is_closed());
    assert!(!b.is_closed());
}

#[tokio::test]
async fn current_context_is_visible_inside_scope() {
    let manager = PoolManager::new(PoolConfig::default());
    let ctx = manager.context();
    assert!(ExecutionContext::current().is_none());

    let id = ctx
        .scope(async { ExecutionContext::current().map(|c| c.id()) })
        .await;
    assert_eq!(id, Some(ctx.id()));
}

#[tokio::test]
async fn close_all_clears_every_context() {
    let manager = PoolManager::new(PoolConfig::default());
    let ctx = manager.context();
    let client = ctx
        .scope(async { manager.get_pool(&TlsVerify::default(), None).unwrap() })
        .await;

    manager.close_all();
    assert!(client.is_closed());
    assert_eq!(manager.pool_count(), 0);

    let fresh = ctx
        .scope(async { manager.get_pool(&TlsVerify::default(), None).unwrap() })
        .await;
    assert!(!fresh.is_closed());
}

#[tokio::test]
async fn missing_ca_bundle_is_reported() {
    let manager = PoolManager::new(PoolConfig::default());
    let verify = TlsVerify::CaFile(PathBuf::from("/nonexistent/biogate-ca.pem"));
    let err = manager.get_pool(&verify, None).unwrap_err();
    assert!(matches!(err, PoolError::CaFile { .. }));
}

#[tokio::test]
async fn context_outliving_manager_drops_cleanly() {
    let manager = PoolManager::new(PoolConfig::default());
    let ctx = manager.context();
    drop(manager);
    // Dropping the context after its manager is gone is a no-op.
    drop(ctx);
}
