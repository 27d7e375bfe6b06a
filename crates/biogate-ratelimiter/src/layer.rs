use crate::{RateLimitedServiceError, RateLimiter};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};

/// A tower layer that rate limits requests by a key derived from each request.
///
/// ```rust
/// use biogate_ratelimiter::{RateLimiter, RateLimiterLayer};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tower::{ServiceBuilder, service_fn};
///
/// let limiter = Arc::new(RateLimiter::default());
/// let svc = ServiceBuilder::new()
///     .layer(RateLimiterLayer::new(limiter, |domain: &String| domain.clone()))
///     .service(service_fn(|domain: String| async move { Ok::<_, std::io::Error>(domain) }));
/// ```
#[derive(Clone)]
pub struct RateLimiterLayer<K> {
    limiter: Arc<RateLimiter>,
    key: K,
    max_wait: Duration,
}

impl<K> RateLimiterLayer<K> {
    /// Creates a layer that fails fast when `key(request)` is limited.
    pub fn new(limiter: Arc<RateLimiter>, key: K) -> Self {
        Self {
            limiter,
            key,
            max_wait: Duration::ZERO,
        }
    }

    /// Waits up to `max_wait` for a token instead of failing fast.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}

impl<S, K: Clone> Layer<S> for RateLimiterLayer<K> {
    type Service = RateLimiterService<S, K>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimiterService {
            inner,
            limiter: Arc::clone(&self.limiter),
            key: self.key.clone(),
            max_wait: self.max_wait,
        }
    }
}

/// Service produced by [`RateLimiterLayer`].
#[derive(Clone)]
pub struct RateLimiterService<S, K> {
    inner: S,
    limiter: Arc<RateLimiter>,
    key: K,
    max_wait: Duration,
}

impl<S, K, Req> Service<Req> for RateLimiterService<S, K>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send,
    S::Response: Send,
    S::Error: Send,
    K: Fn(&Req) -> String,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = RateLimitedServiceError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(RateLimitedServiceError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let key = (self.key)(&req);
        let limiter = Arc::clone(&self.limiter);
        let max_wait = self.max_wait;
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            limiter
                .acquire_within(&key, max_wait)
                .await
                .map_err(RateLimitedServiceError::RateLimited)?;
            inner.call(req).await.map_err(RateLimitedServiceError::Inner)
        })
    }
}
