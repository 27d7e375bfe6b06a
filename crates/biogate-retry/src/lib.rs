//! Retry with exponential backoff.
//!
//! The retry controller re-invokes one operation until it succeeds, fails
//! with an error the [`RetryPolicy`] does not consider retryable, or runs out
//! of attempts. It knows nothing about circuit breakers or caches.
//!
//! Delay before retry *n* (0-indexed) is
//! `min(initial_delay * exponential_base^n, max_delay)`, randomized by ±10%
//! when jitter is enabled and never above `max_delay`.
//!
//! ## Usage
//!
//! ```rust
//! use biogate_retry::{retry, RetryPolicy};
//! use biogate_core::TransportError;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(4)
//!     .initial_delay(Duration::from_millis(100))
//!     .build()
//!     .unwrap();
//!
//! let result = retry(&policy, |attempt| async move {
//!     if attempt < 3 {
//!         Err(TransportError::ConnectTimeout("eutils.ncbi.nlm.nih.gov".into()))
//!     } else {
//!         Ok("ok")
//!     }
//! })
//! .await;
//! assert_eq!(result, Ok("ok"));
//! # }
//! ```
//!
//! [`Retrier`] adds a name and event listeners; [`RetryLayer`] applies the
//! same loop to a tower service.

use biogate_core::{Classify, EventListeners, FnListener};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use std::future::Future;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::{Duration, Instant};

pub use events::RetryEvent;
pub use layer::{RetryLayer, RetryService};
pub use policy::{RetryConfigError, RetryPolicy, RetryPolicyBuilder, DEFAULT_RETRYABLE_STATUSES};

mod events;
mod layer;
mod policy;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "retry_attempts_total",
            "Total number of retries scheduled after a failed attempt"
        );
        describe_counter!(
            "retry_calls_total",
            "Total number of retried operations by final outcome"
        );
    });
}

/// Runs `op` under `policy`.
///
/// `op` receives the 1-based attempt number. Returns the first success, the
/// first non-retryable error, or the last error once attempts run out.
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
{
    run(policy, "retry", &EventListeners::new(), op).await
}

/// A named retry controller with event listeners.
#[derive(Clone, Debug)]
pub struct Retrier {
    name: String,
    policy: Arc<RetryPolicy>,
    event_listeners: EventListeners<RetryEvent>,
}

impl Retrier {
    /// Creates a retrier for `name` using `policy`.
    pub fn new(name: impl Into<String>, policy: impl Into<Arc<RetryPolicy>>) -> Self {
        describe_metrics();
        Self {
            name: name.into(),
            policy: policy.into(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Returns the retrier's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Registers a callback invoked before each retry with `(attempt, delay)`.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Retry { attempt, delay, .. } = event {
                    f(*attempt, *delay);
                }
            }));
        self
    }

    /// Registers a listener for every retry event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&RetryEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Runs `op` under this retrier's policy.
    pub async fn run<F, Fut, T, E>(&self, op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        run(&self.policy, &self.name, &self.event_listeners, op).await
    }
}

async fn run<F, Fut, T, E>(
    policy: &RetryPolicy,
    name: &str,
    listeners: &EventListeners<RetryEvent>,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
{
    let max_attempts = policy.max_attempts().max(1);
    let mut attempt = 1;

    loop {
        let error = match op(attempt).await {
            Ok(value) => {
                listeners.emit(&RetryEvent::Success {
                    name: name.to_string(),
                    timestamp: Instant::now(),
                    attempts: attempt,
                });
                if attempt > 1 {
                    #[cfg(feature = "metrics")]
                    counter!("retry_calls_total", "name" => name.to_string(), "outcome" => "success")
                        .increment(1);
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !policy.is_retryable(&error) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                name,
                attempt,
                kind = error.kind().as_str(),
                status = error.status(),
                "error is not retryable"
            );

            listeners.emit(&RetryEvent::IgnoredError {
                name: name.to_string(),
                timestamp: Instant::now(),
                attempts: attempt,
            });
            return Err(error);
        }

        if attempt >= max_attempts {
            #[cfg(feature = "tracing")]
            tracing::warn!(name, attempts = attempt, "retries exhausted");

            #[cfg(feature = "metrics")]
            counter!("retry_calls_total", "name" => name.to_string(), "outcome" => "exhausted")
                .increment(1);

            listeners.emit(&RetryEvent::Exhausted {
                name: name.to_string(),
                timestamp: Instant::now(),
                attempts: attempt,
            });
            return Err(error);
        }

        let delay = policy.calculate_delay(attempt - 1);

        #[cfg(feature = "tracing")]
        tracing::warn!(
            name,
            attempt,
            kind = error.kind().as_str(),
            status = error.status(),
            delay_ms = delay.as_millis() as u64,
            "retrying after failure"
        );

        #[cfg(feature = "metrics")]
        counter!("retry_attempts_total", "name" => name.to_string()).increment(1);

        listeners.emit(&RetryEvent::Retry {
            name: name.to_string(),
            timestamp: Instant::now(),
            attempt,
            delay,
        });

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
