//! Keyed token-bucket rate limiting.
//!
//! Each key (usually a domain) gets its own bucket, created on first use.
//! Buckets refill lazily on every check and never hold more than their
//! capacity.
//!
//! ```rust
//! use biogate_ratelimiter::{BucketConfig, RateDecision, RateLimiter};
//!
//! let limiter = RateLimiter::new(BucketConfig::new(2.0, 1.0).unwrap());
//! assert_eq!(limiter.check("pubtator3"), RateDecision::Allowed);
//! assert_eq!(limiter.check("pubtator3"), RateDecision::Allowed);
//! assert!(!limiter.check("pubtator3").is_allowed());
//! // Other keys are unaffected.
//! assert!(limiter.check("mygene").is_allowed());
//! ```

use crate::bucket::TokenBucket;
use biogate_core::{EventListeners, FnListener};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::{Duration, Instant};

pub use bucket::{BucketConfig, BucketConfigError, RateDecision};
pub use error::{RateLimitedServiceError, RateLimiterError};
pub use events::RateLimiterEvent;
pub use layer::{RateLimiterLayer, RateLimiterService};

mod bucket;
mod error;
mod events;
mod layer;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// A set of token buckets keyed by name.
#[derive(Debug)]
pub struct RateLimiter {
    default: BucketConfig,
    overrides: HashMap<String, BucketConfig>,
    buckets: Mutex<HashMap<String, TokenBucket>>,
    event_listeners: EventListeners<RateLimiterEvent>,
}

impl RateLimiter {
    /// Creates a limiter whose buckets use `default`.
    pub fn new(default: BucketConfig) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "ratelimiter_calls_total",
                "Total number of rate limit decisions by outcome"
            );
        });

        Self {
            default,
            overrides: HashMap::new(),
            buckets: Mutex::new(HashMap::new()),
            event_listeners: EventListeners::new(),
        }
    }

    /// Uses `config` for the bucket keyed `key`.
    pub fn with_override(mut self, key: impl Into<String>, config: BucketConfig) -> Self {
        self.overrides.insert(key.into(), config);
        self
    }

    /// Registers a callback invoked when an acquire gives up, with
    /// `(key, retry_after)`.
    pub fn on_limited<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RateLimiterEvent| {
                if let RateLimiterEvent::Limited {
                    key, retry_after, ..
                } = event
                {
                    f(key, *retry_after);
                }
            }));
        self
    }

    /// Registers a listener for every limiter event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&RateLimiterEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Takes a token from `key`'s bucket if one is available.
    pub fn check(&self, key: &str) -> RateDecision {
        let decision = {
            let mut buckets = self.lock();
            match buckets.get_mut(key) {
                Some(bucket) => bucket.try_take(),
                None => {
                    let config = self.overrides.get(key).copied().unwrap_or(self.default);
                    let mut bucket = TokenBucket::new(config);
                    let decision = bucket.try_take();
                    buckets.insert(key.to_string(), bucket);
                    decision
                }
            }
        };

        #[cfg(feature = "metrics")]
        counter!(
            "ratelimiter_calls_total",
            "key" => key.to_string(),
            "outcome" => if decision.is_allowed() { "allowed" } else { "limited" }
        )
        .increment(1);

        decision
    }

    /// Takes a token, waiting once for the advised duration if none is
    /// available.
    pub async fn acquire(&self, key: &str) -> Result<(), RateLimiterError> {
        match self.check(key) {
            RateDecision::Allowed => {
                self.emit_allowed(key, Duration::ZERO);
                Ok(())
            }
            RateDecision::Limited { retry_after } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(key, ?retry_after, "waiting for rate limit token");

                tokio::time::sleep(retry_after).await;
                match self.check(key) {
                    RateDecision::Allowed => {
                        self.emit_allowed(key, retry_after);
                        Ok(())
                    }
                    RateDecision::Limited { retry_after } => Err(self.limited(key, retry_after)),
                }
            }
        }
    }

    /// Takes a token, waiting at most `max_wait` in total.
    ///
    /// A zero `max_wait` fails fast. Returns how long the call waited.
    pub async fn acquire_within(
        &self,
        key: &str,
        max_wait: Duration,
    ) -> Result<Duration, RateLimiterError> {
        let mut waited = Duration::ZERO;
        loop {
            match self.check(key) {
                RateDecision::Allowed => {
                    self.emit_allowed(key, waited);
                    return Ok(waited);
                }
                RateDecision::Limited { retry_after } => {
                    if waited + retry_after > max_wait {
                        return Err(self.limited(key, retry_after));
                    }

                    #[cfg(feature = "tracing")]
                    tracing::debug!(key, ?retry_after, "waiting for rate limit token");

                    tokio::time::sleep(retry_after).await;
                    waited += retry_after;
                }
            }
        }
    }

    /// Returns the tokens currently in `key`'s bucket, if it exists.
    pub fn available(&self, key: &str) -> Option<f64> {
        self.lock().get_mut(key).map(|bucket| bucket.tokens())
    }

    /// Returns the number of buckets created so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no bucket has been created yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn emit_allowed(&self, key: &str, waited: Duration) {
        self.event_listeners.emit(&RateLimiterEvent::Allowed {
            key: key.to_string(),
            timestamp: Instant::now(),
            waited,
        });
    }

    fn limited(&self, key: &str, retry_after: Duration) -> RateLimiterError {
        #[cfg(feature = "tracing")]
        tracing::warn!(key, ?retry_after, "rate limit exceeded");

        self.event_listeners.emit(&RateLimiterEvent::Limited {
            key: key.to_string(),
            timestamp: Instant::now(),
            retry_after,
        });
        RateLimiterError::RateLimited {
            key: key.to_string(),
            retry_after,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(BucketConfig::default())
    }
}
