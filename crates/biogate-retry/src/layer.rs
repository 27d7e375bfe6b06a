use crate::{RetryPolicy, Retrier};
use biogate_core::Classify;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A tower layer that retries failed requests.
///
/// Requests must be `Clone` so they can be re-sent.
///
/// ```rust
/// use biogate_retry::{RetryLayer, RetryPolicy};
/// use biogate_core::TransportError;
/// use tower::{ServiceBuilder, service_fn};
///
/// let svc = ServiceBuilder::new()
///     .layer(RetryLayer::new("pubtator3", RetryPolicy::default()))
///     .service(service_fn(|req: String| async move { Ok::<_, TransportError>(req) }));
/// ```
#[derive(Clone, Debug)]
pub struct RetryLayer {
    retrier: Retrier,
}

impl RetryLayer {
    /// Creates a layer retrying under `policy`, reporting as `name`.
    pub fn new(name: impl Into<String>, policy: RetryPolicy) -> Self {
        Self::from_retrier(Retrier::new(name, policy))
    }

    /// Creates a layer from a configured retrier.
    pub fn from_retrier(retrier: Retrier) -> Self {
        Self { retrier }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            retrier: self.retrier.clone(),
        }
    }
}

/// Service produced by [`RetryLayer`].
#[derive(Clone, Debug)]
pub struct RetryService<S> {
    inner: S,
    retrier: Retrier,
}

impl<S, Req> Service<Req> for RetryService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send,
    S::Response: Send,
    S::Error: Classify + Send,
    Req: Clone + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let retrier = self.retrier.clone();

        Box::pin(async move {
            retrier
                .run(move |_| {
                    let mut svc = inner.clone();
                    let req = req.clone();
                    async move {
                        futures::future::poll_fn(|cx| svc.poll_ready(cx)).await?;
                        svc.call(req).await
                    }
                })
                .await
        })
    }
}
