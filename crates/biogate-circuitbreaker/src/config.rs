use crate::events::CircuitBreakerEvent;
use crate::CircuitState;
use biogate_core::{ClassSet, ErrorKind, EventListeners, FnListener};
use std::time::Duration;
use thiserror::Error;

/// Configuration shared by every breaker built from it.
#[derive(Clone, Debug)]
pub struct BreakerConfig {
    pub(crate) failure_threshold: u32,
    pub(crate) recovery_timeout: Duration,
    pub(crate) success_threshold: u32,
    pub(crate) half_open_max_calls: u32,
    pub(crate) expected: ClassSet,
    pub(crate) excluded: ClassSet,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl BreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::new()
    }

    /// Consecutive failures that open the circuit.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Time the circuit stays open before admitting a trial call.
    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    /// Consecutive half-open successes that close the circuit.
    pub fn success_threshold(&self) -> u32 {
        self.success_threshold
    }

    /// Maximum number of concurrent trial calls while half-open.
    pub fn half_open_max_calls(&self) -> u32 {
        self.half_open_max_calls
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfigBuilder::new().defaults()
    }
}

/// Errors returned when a breaker configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreakerConfigError {
    /// A threshold was set to zero.
    #[error("{0} must be at least 1")]
    ZeroThreshold(&'static str),
}

/// Builder for [`BreakerConfig`].
pub struct BreakerConfigBuilder {
    failure_threshold: u32,
    recovery_timeout: Duration,
    success_threshold: u32,
    half_open_max_calls: Option<u32>,
    expected: ClassSet,
    excluded: ClassSet,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl BreakerConfigBuilder {
    /// Creates a new builder with default values.
    ///
    /// Defaults:
    /// - failure_threshold: 5
    /// - recovery_timeout: 60 seconds
    /// - success_threshold: 2
    /// - half_open_max_calls: same as success_threshold
    /// - expected: connect/read timeouts, connection errors, 408, 429 and 5xx
    /// - excluded: nothing
    pub fn new() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 2,
            half_open_max_calls: None,
            expected: ClassSet::new()
                .with_kinds(ErrorKind::TRANSIENT)
                .with_statuses([408, 429])
                .with_statuses(500..=599),
            excluded: ClassSet::new(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the number of consecutive failures that opens the circuit.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Sets how long the circuit stays open before a trial call is admitted.
    ///
    /// Default: 60 seconds
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Sets the number of consecutive half-open successes that closes the circuit.
    ///
    /// Default: 2
    pub fn success_threshold(mut self, n: u32) -> Self {
        self.success_threshold = n;
        self
    }

    /// Sets how many trial calls may be in flight while half-open.
    ///
    /// Default: same as `success_threshold`
    pub fn half_open_max_calls(mut self, n: u32) -> Self {
        self.half_open_max_calls = Some(n);
        self
    }

    /// Replaces the set of error classes that count as failures.
    pub fn expected(mut self, classes: ClassSet) -> Self {
        self.expected = classes;
        self
    }

    /// Sets error classes that never count toward breaker state.
    ///
    /// Exclusion wins over `expected`.
    pub fn excluded(mut self, classes: ClassSet) -> Self {
        self.excluded = classes;
        self
    }

    /// Registers a callback invoked on every state transition with `(from, to)`.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback invoked when a call is rejected.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Registers a callback invoked when an error is ignored by classification.
    pub fn on_ignored_error<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::IgnoredError { .. }) {
                    f();
                }
            }));
        self
    }

    /// Registers a listener for every breaker event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<BreakerConfig, BreakerConfigError> {
        if self.failure_threshold == 0 {
            return Err(BreakerConfigError::ZeroThreshold("failure_threshold"));
        }
        if self.success_threshold == 0 {
            return Err(BreakerConfigError::ZeroThreshold("success_threshold"));
        }
        if self.half_open_max_calls == Some(0) {
            return Err(BreakerConfigError::ZeroThreshold("half_open_max_calls"));
        }
        Ok(self.defaults())
    }

    fn defaults(self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold.max(1),
            recovery_timeout: self.recovery_timeout,
            success_threshold: self.success_threshold.max(1),
            half_open_max_calls: self
                .half_open_max_calls
                .unwrap_or(self.success_threshold)
                .max(1),
            expected: self.expected,
            excluded: self.excluded,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for BreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
