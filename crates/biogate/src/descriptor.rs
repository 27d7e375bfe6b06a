//! Request descriptors and cache fingerprints.

use biogate_pool::TlsVerify;
use biogate_retry::RetryPolicy;
use reqwest::Method;
use serde_json::{Map, Value};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// What to do when a domain's rate limit is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitMode {
    /// Wait for a token, at most `max_wait` in total.
    Wait {
        /// Upper bound on the time spent waiting.
        max_wait: Duration,
    },
    /// Fail immediately with a rate-limit error.
    FailFast,
}

impl Default for RateLimitMode {
    fn default() -> Self {
        RateLimitMode::Wait {
            max_wait: Duration::from_secs(5),
        }
    }
}

impl RateLimitMode {
    pub(crate) fn max_wait(&self) -> Duration {
        match self {
            RateLimitMode::Wait { max_wait } => *max_wait,
            RateLimitMode::FailFast => Duration::ZERO,
        }
    }
}

/// An outbound request. Immutable once built.
///
/// ```rust
/// use biogate::RequestDescriptor;
/// use serde_json::json;
/// use std::time::Duration;
///
/// let request = RequestDescriptor::get("https://mygene.info/v3/query")
///     .payload(json!({"q": "symbol:BRCA1", "size": 5}))
///     .endpoint_key("mygene_query")
///     .cache_ttl(Duration::from_secs(3600))
///     .build();
///
/// assert_eq!(request.fingerprint().len(), 16);
/// ```
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    payload: Value,
    domain: Option<String>,
    endpoint_key: Option<String>,
    cache_ttl: Duration,
    retry_policy: Option<Arc<RetryPolicy>>,
    timeout: Option<Duration>,
    verify: TlsVerify,
    rate_limit: Option<RateLimitMode>,
}

impl RequestDescriptor {
    /// Starts a request with `method` to `url`.
    pub fn builder(method: Method, url: impl Into<String>) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder {
            inner: RequestDescriptor {
                method,
                url: url.into(),
                payload: Value::Null,
                domain: None,
                endpoint_key: None,
                cache_ttl: Duration::ZERO,
                retry_policy: None,
                timeout: None,
                verify: TlsVerify::default(),
                rate_limit: None,
            },
        }
    }

    /// Starts a GET request.
    pub fn get(url: impl Into<String>) -> RequestDescriptorBuilder {
        Self::builder(Method::GET, url)
    }

    /// Starts a POST request.
    pub fn post(url: impl Into<String>) -> RequestDescriptorBuilder {
        Self::builder(Method::POST, url)
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Query or body payload; `Null` when absent.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Explicit domain key, if one was given.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Endpoint key to validate against the registry.
    pub fn endpoint_key(&self) -> Option<&str> {
        self.endpoint_key.as_deref()
    }

    /// Cache TTL; zero disables caching.
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Retry policy override.
    pub fn retry_policy(&self) -> Option<&Arc<RetryPolicy>> {
        self.retry_policy.as_ref()
    }

    /// Per-attempt timeout override.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// TLS verification settings.
    pub fn verify(&self) -> &TlsVerify {
        &self.verify
    }

    /// Rate-limit mode override.
    pub fn rate_limit(&self) -> Option<RateLimitMode> {
        self.rate_limit
    }

    /// Host part of the URL, lowercased.
    pub fn host(&self) -> Option<String> {
        url_host(&self.url)
    }

    /// Cache key: method, URL and canonical payload.
    ///
    /// Payloads differing only in object key order share a key; any other
    /// difference yields a different key.
    pub fn cache_key(&self) -> String {
        format!(
            "{} {} {}",
            self.method.as_str(),
            self.url,
            canonical_json(&self.payload)
        )
    }

    /// Short hash of [`cache_key`](Self::cache_key), as 16 hex digits.
    ///
    /// For logs only; the value may change between Rust releases.
    pub fn fingerprint(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.cache_key().hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

/// Builder for [`RequestDescriptor`].
#[derive(Debug, Clone)]
pub struct RequestDescriptorBuilder {
    inner: RequestDescriptor,
}

impl RequestDescriptorBuilder {
    /// Sets the payload.
    pub fn payload(mut self, payload: Value) -> Self {
        self.inner.payload = payload;
        self
    }

    /// Sets the domain key.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.inner.domain = Some(domain.into());
        self
    }

    /// Sets the endpoint key.
    pub fn endpoint_key(mut self, key: impl Into<String>) -> Self {
        self.inner.endpoint_key = Some(key.into());
        self
    }

    /// Sets the cache TTL.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.inner.cache_ttl = ttl;
        self
    }

    /// Overrides the dispatcher's retry policy.
    pub fn retry_policy(mut self, policy: impl Into<Arc<RetryPolicy>>) -> Self {
        self.inner.retry_policy = Some(policy.into());
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner.timeout = Some(timeout);
        self
    }

    /// Sets TLS verification.
    pub fn verify(mut self, verify: impl Into<TlsVerify>) -> Self {
        self.inner.verify = verify.into();
        self
    }

    /// Sets the rate-limit mode.
    pub fn rate_limit(mut self, mode: RateLimitMode) -> Self {
        self.inner.rate_limit = Some(mode);
        self
    }

    /// Finishes the descriptor.
    pub fn build(self) -> RequestDescriptor {
        self.inner
    }
}

/// Serializes `value` with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    sort_keys(value).to_string()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

pub(crate) fn url_host(url: &str) -> Option<String> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = match host.strip_prefix('[') {
        Some(v6) => v6.split(']').next()?,
        None => host.split(':').next()?,
    };
    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}
