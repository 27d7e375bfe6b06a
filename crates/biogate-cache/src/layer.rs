use crate::{CacheValue, ResponseCache};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};

/// Decides whether a request skips the cache.
pub trait Bypass<Req> {
    /// Returns true if `req` should skip the cache.
    fn bypass(&self, req: &Req) -> bool;
}

/// Never skips the cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverBypass;

impl<Req> Bypass<Req> for NeverBypass {
    fn bypass(&self, _req: &Req) -> bool {
        false
    }
}

/// Skips the cache when a closure returns true.
#[derive(Debug, Clone, Copy)]
pub struct FnBypass<F>(F);

impl<Req, F: Fn(&Req) -> bool> Bypass<Req> for FnBypass<F> {
    fn bypass(&self, req: &Req) -> bool {
        (self.0)(req)
    }
}

/// A tower layer that serves responses from a [`ResponseCache`].
///
/// `key` derives the cache key from a request; requests selected by the
/// bypass predicate skip the cache entirely.
pub struct CacheLayer<V, K, B = NeverBypass> {
    cache: Arc<ResponseCache<V>>,
    key: K,
    bypass: B,
    ttl: Duration,
}

impl<V, K> CacheLayer<V, K> {
    /// Creates a layer caching responses for `ttl` under `key(request)`.
    pub fn new(cache: Arc<ResponseCache<V>>, key: K, ttl: Duration) -> Self {
        CacheLayer {
            cache,
            key,
            bypass: NeverBypass,
            ttl,
        }
    }
}

impl<V, K, B> CacheLayer<V, K, B> {
    /// Skips the cache for requests where `bypass(request)` is true.
    pub fn bypass<F>(self, bypass: F) -> CacheLayer<V, K, FnBypass<F>> {
        CacheLayer {
            cache: self.cache,
            key: self.key,
            bypass: FnBypass(bypass),
            ttl: self.ttl,
        }
    }
}

impl<V, K: Clone, B: Clone> Clone for CacheLayer<V, K, B> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            key: self.key.clone(),
            bypass: self.bypass.clone(),
            ttl: self.ttl,
        }
    }
}

impl<S, V, K: Clone, B: Clone> Layer<S> for CacheLayer<V, K, B> {
    type Service = CacheService<S, V, K, B>;

    fn layer(&self, inner: S) -> Self::Service {
        CacheService {
            inner,
            cache: Arc::clone(&self.cache),
            key: self.key.clone(),
            bypass: self.bypass.clone(),
            ttl: self.ttl,
        }
    }
}

/// Service produced by [`CacheLayer`].
pub struct CacheService<S, V, K, B> {
    inner: S,
    cache: Arc<ResponseCache<V>>,
    key: K,
    bypass: B,
    ttl: Duration,
}

impl<S: Clone, V, K: Clone, B: Clone> Clone for CacheService<S, V, K, B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            cache: Arc::clone(&self.cache),
            key: self.key.clone(),
            bypass: self.bypass.clone(),
            ttl: self.ttl,
        }
    }
}

impl<S, V, K, B, Req> Service<Req> for CacheService<S, V, K, B>
where
    S: Service<Req, Response = V> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
    V: CacheValue + Clone + Send + Sync + 'static,
    K: Fn(&Req) -> String,
    B: Bypass<Req>,
    Req: Send + 'static,
{
    type Response = V;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<V, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let bypass = self.bypass.bypass(&req);
        let key = (self.key)(&req);
        let cache = Arc::clone(&self.cache);
        let ttl = self.ttl;
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            cache
                .memoize(&key, ttl, bypass, move || inner.call(req))
                .await
        })
    }
}
