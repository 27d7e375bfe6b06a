//! Per-domain circuit breakers.
//!
//! A circuit breaker stops calling an upstream that keeps failing, and lets a
//! bounded number of trial calls through once a recovery timeout has passed.
//!
//! ## States
//! - **Closed**: normal operation; consecutive classified failures are counted
//! - **Open**: calls are rejected without touching the network
//! - **Half-Open**: a limited number of trial calls decide whether to close
//!   again or reopen
//!
//! Errors are classified through [`biogate_core::Classify`]. Only errors in
//! the breaker's *expected* set count as failures; errors in the *excluded*
//! set, or outside the expected set, pass through without affecting state.
//!
//! ## Usage
//!
//! ```rust
//! use biogate_circuitbreaker::{BreakerConfig, BreakerRegistry, CircuitState};
//! use biogate_core::TransportError;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let registry = BreakerRegistry::new(
//!     BreakerConfig::builder()
//!         .failure_threshold(3)
//!         .recovery_timeout(Duration::from_secs(30))
//!         .build()
//!         .unwrap(),
//! );
//!
//! let breaker = registry.get_or_create("clinicaltrials");
//! let result = breaker
//!     .call(|| async { Err::<(), _>(TransportError::status(503, "busy")) })
//!     .await;
//!
//! assert!(result.is_err());
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! # }
//! ```
//!
//! ## Middleware
//!
//! [`CircuitBreakerLayer`] wraps any tower service whose error implements
//! [`Classify`](biogate_core::Classify) with a breaker from a registry.

use crate::circuit::Circuit;
use biogate_core::Classify;
#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
#[cfg(feature = "metrics")]
use std::sync::Once;

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{BreakerConfig, BreakerConfigBuilder, BreakerConfigError};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};
pub use registry::BreakerRegistry;

mod circuit;
mod config;
mod error;
mod events;
mod layer;
mod registry;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "circuitbreaker_calls_total",
            "Total number of calls through the circuit breaker"
        );
        describe_counter!(
            "circuitbreaker_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_gauge!(
            "circuitbreaker_state",
            "Current state of the circuit breaker (0 closed, 1 open, 2 half-open)"
        );
    });
}

/// How a finished call affects breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The call succeeded.
    Success,
    /// The call failed with an error in the expected set.
    Failure,
    /// The call failed with an error that does not count.
    Ignored,
}

/// A named circuit breaker.
///
/// Breakers are usually obtained from a [`BreakerRegistry`], one per domain.
pub struct CircuitBreaker {
    name: String,
    config: Arc<BreakerConfig>,
    circuit: Mutex<Circuit>,
    state_atomic: Arc<AtomicU8>,
}

impl CircuitBreaker {
    /// Creates a breaker with the given name and configuration.
    pub fn new(name: impl Into<String>, config: impl Into<Arc<BreakerConfig>>) -> Self {
        describe_metrics();
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            name: name.into(),
            config: config.into(),
            circuit: Mutex::new(Circuit::new(Arc::clone(&state_atomic))),
            state_atomic,
        }
    }

    /// Returns the breaker's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the breaker's configuration.
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Returns the current state without taking the lock.
    ///
    /// An open breaker whose recovery timeout has elapsed still reports
    /// `Open` until the next admission check moves it to `HalfOpen`.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// Returns a snapshot of the breaker's counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.lock().metrics()
    }

    /// Asks for admission of one call.
    ///
    /// Every `true` must be followed by exactly one `record_*` call. Prefer
    /// [`permit`](Self::permit), which enforces that.
    pub fn try_acquire(&self) -> bool {
        self.lock().try_acquire(&self.name, &self.config)
    }

    /// Asks for admission of one call, returning a permit that records the
    /// outcome.
    ///
    /// Dropping the permit without recording releases a half-open slot.
    pub fn permit(&self) -> Option<CallPermit<'_>> {
        if self.try_acquire() {
            Some(CallPermit {
                breaker: self,
                done: false,
            })
        } else {
            None
        }
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        self.lock().record_success(&self.name, &self.config);
    }

    /// Records a classified failure.
    pub fn record_failure(&self) {
        self.lock().record_failure(&self.name, &self.config);
    }

    /// Records an error that does not count toward state.
    pub fn record_ignored(&self) {
        self.lock().record_ignored(&self.name, &self.config);
    }

    /// Classifies an error against the expected and excluded sets.
    pub fn classify<E: Classify + ?Sized>(&self, error: &E) -> Outcome {
        if self.config.excluded.matches(error) {
            Outcome::Ignored
        } else if self.config.expected.matches(error) {
            Outcome::Failure
        } else {
            Outcome::Ignored
        }
    }

    /// Classifies and records the result of a call.
    pub fn record<T, E: Classify>(&self, result: &Result<T, E>) -> Outcome {
        let outcome = match result {
            Ok(_) => Outcome::Success,
            Err(e) => self.classify(e),
        };
        self.record_outcome(outcome);
        outcome
    }

    fn record_outcome(&self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.record_success(),
            Outcome::Failure => self.record_failure(),
            Outcome::Ignored => self.record_ignored(),
        }
    }

    /// Runs `op` under the breaker.
    ///
    /// Returns [`CircuitBreakerError::OpenCircuit`] without calling `op` when
    /// the breaker rejects the call.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let permit = self.permit().ok_or_else(|| CircuitBreakerError::OpenCircuit {
            name: self.name.clone(),
        })?;
        let result = op().await;
        permit.record(&result);
        result.map_err(CircuitBreakerError::Inner)
    }

    /// Forces the breaker closed and clears its counters.
    pub fn reset(&self) {
        self.lock().reset(&self.name, &self.config);
    }

    /// Forces the breaker open.
    pub fn force_open(&self) {
        self.lock().force_open(&self.name, &self.config);
    }

    fn lock(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Admission granted by [`CircuitBreaker::permit`].
#[must_use = "a permit records nothing unless its outcome is reported"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    done: bool,
}

impl CallPermit<'_> {
    /// Classifies and records the result of the admitted call.
    pub fn record<T, E: Classify>(mut self, result: &Result<T, E>) -> Outcome {
        self.done = true;
        self.breaker.record(result)
    }

    /// Records an explicit outcome for the admitted call.
    pub fn finish(mut self, outcome: Outcome) {
        self.done = true;
        self.breaker.record_outcome(outcome);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.breaker.lock().release();
        }
    }
}
