//! The request dispatcher.

use crate::config::{ConfigError, GatewayConfig};
use crate::descriptor::{RateLimitMode, RequestDescriptor};
use crate::endpoints::EndpointRegistry;
use crate::error::RequestError;
use crate::transport::{ReqwestTransport, Transport, TransportRequest};
use biogate_cache::ResponseCache;
use biogate_circuitbreaker::{BreakerRegistry, Outcome};
use biogate_core::{Classify, ErrorKind, TransportError};
use biogate_pool::{
    ConnectionSlot, ExecutionContext, PoolConfig, PoolError, PoolManager, PooledClient, TlsVerify,
};
use biogate_ratelimiter::RateLimiter;
use biogate_retry::{Retrier, RetryPolicy};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Duration;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

const DEFAULT_DOMAIN: &str = "default";

/// Routes every outbound request through cache, rate limiter, circuit
/// breaker, connection pool and retry controller.
///
/// Ordinary upstream failures come back as [`RequestError`]s; nothing
/// panics. Clone the `Arc`s handed to the builder to inspect or reset the
/// registries while the dispatcher is in use.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    cache: Arc<ResponseCache<Value>>,
    limiter: Arc<RateLimiter>,
    breakers: Arc<BreakerRegistry>,
    pools: Arc<PoolManager>,
    endpoints: Arc<EndpointRegistry>,
    retry_policy: Arc<RetryPolicy>,
    rate_limit_mode: RateLimitMode,
    cache_enabled: bool,
    offline: AtomicBool,
}

impl Dispatcher {
    /// Creates a builder with default components.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Creates a dispatcher with default components and real HTTP.
    pub fn new() -> Self {
        DispatcherBuilder::new().build()
    }

    /// Creates a dispatcher from validated configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        Ok(DispatcherBuilder::new()
            .breakers(Arc::new(config.circuit_breaker.to_registry()?))
            .rate_limiter(Arc::new(config.rate_limit.to_limiter()?))
            .retry_policy(config.retry.to_policy()?)
            .pools(PoolManager::new(config.pool.to_pool_config()))
            .rate_limit_mode(config.rate_limit.mode())
            .cache_enabled(config.cache.enabled)
            .offline(config.offline)
            .build())
    }

    /// Sends `request` and returns its decoded body.
    pub async fn dispatch(&self, request: &RequestDescriptor) -> Result<Value, RequestError> {
        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();

        let result = self.dispatch_inner(request).await;

        if let Err(err) = &result {
            tracing::debug!(
                url = request.url(),
                code = err.code,
                reason = err.reason.as_str(),
                "request failed"
            );
        }

        #[cfg(feature = "metrics")]
        {
            let outcome = match &result {
                Ok(_) => "success",
                Err(err) => err.reason.as_str(),
            };
            let domain = self.domain_for(request);
            counter!("dispatcher_requests_total", "domain" => domain.clone(), "outcome" => outcome)
                .increment(1);
            histogram!("dispatcher_request_duration_seconds", "domain" => domain)
                .record(started.elapsed().as_secs_f64());
        }

        result
    }

    /// Builds a descriptor from its parts and dispatches it.
    #[allow(clippy::too_many_arguments)]
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        payload: Value,
        domain: Option<&str>,
        endpoint_key: Option<&str>,
        cache_ttl: Duration,
        retry_policy: Option<RetryPolicy>,
    ) -> Result<Value, RequestError> {
        let mut builder = RequestDescriptor::builder(method, url)
            .payload(payload)
            .cache_ttl(cache_ttl);
        if let Some(domain) = domain {
            builder = builder.domain(domain);
        }
        if let Some(key) = endpoint_key {
            builder = builder.endpoint_key(key);
        }
        if let Some(policy) = retry_policy {
            builder = builder.retry_policy(policy);
        }
        self.dispatch(&builder.build()).await
    }

    async fn dispatch_inner(&self, request: &RequestDescriptor) -> Result<Value, RequestError> {
        let cache_key = request.cache_key();

        if self.is_offline() {
            return match self.cache_enabled.then(|| self.cache.get(&cache_key)).flatten() {
                Some(value) => Ok(value),
                None => Err(RequestError::offline(request.url())),
            };
        }

        if let Some(key) = request.endpoint_key() {
            if !self.endpoints.contains(key) {
                return Err(RequestError::unknown_endpoint(key));
            }
        }
        let domain = self.domain_for(request);

        let ttl = request.cache_ttl();
        let use_cache = self.cache_enabled && !ttl.is_zero();
        if use_cache {
            if let Some(value) = self.cache.get(&cache_key) {
                tracing::debug!(domain = %domain, fingerprint = %request.fingerprint(), "served from cache");
                return Ok(value);
            }
        }

        let mode = request.rate_limit().unwrap_or(self.rate_limit_mode);
        self.limiter
            .acquire_within(&domain, mode.max_wait())
            .await
            .map_err(|err| {
                tracing::warn!(domain = %domain, retry_after = ?err.retry_after(), "rate limited");
                RequestError::rate_limited(&err)
            })?;

        let breaker = self.breakers.get_or_create(&domain);
        let Some(permit) = breaker.permit() else {
            tracing::warn!(domain = %domain, "circuit open, request rejected");
            return Err(RequestError::circuit_open(&domain));
        };

        let policy = request
            .retry_policy()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.retry_policy));
        let retrier = Retrier::new(domain.clone(), Arc::clone(&policy));

        let outbound = TransportRequest {
            method: request.method().clone(),
            url: request.url().to_string(),
            payload: request.payload().clone(),
            timeout: request.timeout(),
        };
        let outbound = &outbound;
        let pools = &*self.pools;
        let verify = request.verify();
        let transport = &*self.transport;

        let result = retrier
            .run(move |attempt| async move {
                let (client, _slot) = checkout(pools, verify, outbound.timeout)
                    .await
                    .map_err(AttemptError::Pool)?;
                tracing::debug!(url = %outbound.url, attempt, "sending request");
                transport
                    .send(&client, outbound)
                    .await
                    .map_err(AttemptError::Upstream)
            })
            .await;

        // Local pool failures never reached the upstream.
        let outcome = match &result {
            Err(AttemptError::Pool(_)) => {
                permit.finish(Outcome::Ignored);
                Outcome::Ignored
            }
            _ => permit.record(&result),
        };
        tracing::debug!(domain = %domain, ?outcome, "breaker outcome recorded");

        match result {
            Ok(value) => {
                if use_cache {
                    self.cache.set(cache_key, value.clone(), ttl);
                }
                Ok(value)
            }
            Err(AttemptError::Upstream(err)) => Err(RequestError::from_transport(
                &err,
                policy.is_retryable(&err),
            )),
            Err(AttemptError::Pool(err)) => Err(pool_error(err)),
        }
    }

    /// Resolves the domain key: explicit, then endpoint registry, then URL host.
    pub fn domain_for(&self, request: &RequestDescriptor) -> String {
        if let Some(domain) = request.domain() {
            return domain.to_string();
        }
        if let Some(info) = request.endpoint_key().and_then(|key| self.endpoints.get(key)) {
            return info.domain.clone();
        }
        request
            .host()
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_string())
    }

    /// Switches offline mode at runtime.
    pub fn set_offline(&self, offline: bool) {
        tracing::info!(offline, "offline mode changed");
        self.offline.store(offline, Ordering::Release);
    }

    /// Returns true if only cache hits are served.
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    /// Opens an execution context whose pooled connections are reused by
    /// every request dispatched inside its scope.
    pub fn context(&self) -> ExecutionContext {
        self.pools.context()
    }

    /// Closes every pooled connection.
    pub fn shutdown(&self) {
        tracing::info!(pools = self.pools.pool_count(), "shutting down connection pools");
        self.pools.close_all();
    }

    /// The response cache.
    pub fn cache(&self) -> &Arc<ResponseCache<Value>> {
        &self.cache
    }

    /// The rate limiter.
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The circuit breaker registry.
    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    /// The connection pool manager.
    pub fn pools(&self) -> &Arc<PoolManager> {
        &self.pools
    }

    /// The endpoint registry.
    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    /// The default retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("offline", &self.is_offline())
            .field("cache_enabled", &self.cache_enabled)
            .field("cached", &self.cache.len())
            .field("breakers", &self.breakers.len())
            .field("pools", &self.pools.pool_count())
            .field("endpoints", &self.endpoints.len())
            .finish_non_exhaustive()
    }
}

/// Why a single attempt failed.
#[derive(Debug)]
enum AttemptError {
    /// The network or the upstream failed.
    Upstream(TransportError),
    /// No usable local client; nothing was sent.
    Pool(PoolError),
}

impl Classify for AttemptError {
    fn kind(&self) -> ErrorKind {
        match self {
            AttemptError::Upstream(err) => err.kind(),
            AttemptError::Pool(_) => ErrorKind::InvalidRequest,
        }
    }

    fn status(&self) -> Option<u16> {
        match self {
            AttemptError::Upstream(err) => Classify::status(err),
            AttemptError::Pool(_) => None,
        }
    }
}

/// Fetches a live client for this attempt and a connection slot on it.
///
/// A client closed between lookup and slot acquisition is replaced once.
async fn checkout(
    pools: &PoolManager,
    verify: &TlsVerify,
    timeout: Option<Duration>,
) -> Result<(Arc<PooledClient>, ConnectionSlot), PoolError> {
    let mut replaced = false;
    loop {
        let client = pools.get_pool(verify, timeout)?;
        match client.acquire().await {
            Ok(slot) => return Ok((client, slot)),
            Err(PoolError::Closed) if !replaced => replaced = true,
            Err(err) => return Err(err),
        }
    }
}

fn pool_error(err: PoolError) -> RequestError {
    match err {
        PoolError::CaFile { .. } | PoolError::Certificate(_) => {
            RequestError::invalid_request(err.to_string())
        }
        PoolError::Build(_) | PoolError::Closed => RequestError::network(err.to_string()),
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<ResponseCache<Value>>>,
    limiter: Option<Arc<RateLimiter>>,
    breakers: Option<Arc<BreakerRegistry>>,
    pools: Option<Arc<PoolManager>>,
    endpoints: EndpointRegistry,
    retry_policy: RetryPolicy,
    rate_limit_mode: RateLimitMode,
    cache_enabled: bool,
    offline: bool,
}

impl DispatcherBuilder {
    /// Creates a builder.
    ///
    /// Defaults:
    /// - transport: reqwest
    /// - endpoints: the built-in biomedical endpoints
    /// - retry policy: [`RetryPolicy::default`]
    /// - rate limit mode: wait up to 5 seconds
    /// - cache enabled, online
    pub fn new() -> Self {
        Self {
            transport: None,
            cache: None,
            limiter: None,
            breakers: None,
            pools: None,
            endpoints: EndpointRegistry::builtin(),
            retry_policy: RetryPolicy::default(),
            rate_limit_mode: RateLimitMode::default(),
            cache_enabled: true,
            offline: false,
        }
    }

    /// Uses `transport` for network I/O.
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Uses a shared transport.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses `cache` for responses.
    pub fn cache(mut self, cache: Arc<ResponseCache<Value>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Uses `limiter` for rate limiting.
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Uses `breakers` for circuit breaking.
    pub fn breakers(mut self, breakers: Arc<BreakerRegistry>) -> Self {
        self.breakers = Some(breakers);
        self
    }

    /// Uses `pools` for connections.
    pub fn pools(mut self, pools: Arc<PoolManager>) -> Self {
        self.pools = Some(pools);
        self
    }

    /// Replaces the endpoint registry.
    pub fn endpoints(mut self, endpoints: EndpointRegistry) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Sets the retry policy used when a request has none.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the rate limit mode used when a request has none.
    pub fn rate_limit_mode(mut self, mode: RateLimitMode) -> Self {
        self.rate_limit_mode = mode;
        self
    }

    /// Enables or disables the response cache.
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Starts in offline mode.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Builds the dispatcher.
    pub fn build(self) -> Dispatcher {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "dispatcher_requests_total",
                "Total number of dispatched requests by domain and outcome"
            );
            describe_histogram!(
                "dispatcher_request_duration_seconds",
                "Time spent dispatching a request, including retries"
            );
        });

        Dispatcher {
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(ReqwestTransport)),
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(ResponseCache::new("responses"))),
            limiter: self
                .limiter
                .unwrap_or_else(|| Arc::new(RateLimiter::default())),
            breakers: self
                .breakers
                .unwrap_or_else(|| Arc::new(BreakerRegistry::default())),
            pools: self
                .pools
                .unwrap_or_else(|| PoolManager::new(PoolConfig::default())),
            endpoints: Arc::new(self.endpoints),
            retry_policy: Arc::new(self.retry_policy),
            rate_limit_mode: self.rate_limit_mode,
            cache_enabled: self.cache_enabled,
            offline: AtomicBool::new(self.offline),
        }
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
