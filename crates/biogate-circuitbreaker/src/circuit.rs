use crate::config::BreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed = 0,
    /// The circuit is open and calls are rejected.
    Open = 1,
    /// The circuit is half-open and a limited number of trial calls are allowed.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Returns a stable label, used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Point-in-time view of a breaker's internal counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitMetrics {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive classified failures since the last success or transition.
    pub consecutive_failures: u32,
    /// Consecutive successes while half-open.
    pub consecutive_successes: u32,
    /// Trial calls currently in flight while half-open.
    pub half_open_in_flight: u32,
    /// Time since the last state transition.
    pub time_since_state_change: Duration,
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    last_state_change: Instant,
    consecutive_failures: u32,
    consecutive_successes: u32,
    half_open_in_flight: u32,
}

impl Circuit {
    pub(crate) fn new(state_atomic: Arc<AtomicU8>) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            last_state_change: Instant::now(),
            consecutive_failures: 0,
            consecutive_successes: 0,
            half_open_in_flight: 0,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn metrics(&self) -> CircuitMetrics {
        CircuitMetrics {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            half_open_in_flight: self.half_open_in_flight,
            time_since_state_change: self.last_state_change.elapsed(),
        }
    }

    /// Decides whether a call may proceed, moving Open to HalfOpen once the
    /// recovery timeout has elapsed.
    pub(crate) fn try_acquire(&mut self, name: &str, config: &BreakerConfig) -> bool {
        if self.state == CircuitState::Open
            && self.last_state_change.elapsed() >= config.recovery_timeout
        {
            self.transition_to(CircuitState::HalfOpen, name, config);
        }

        let permitted = match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if self.half_open_in_flight < config.half_open_max_calls {
                    self.half_open_in_flight += 1;
                    true
                } else {
                    false
                }
            }
        };

        if permitted {
            #[cfg(feature = "tracing")]
            tracing::debug!(breaker = name, state = self.state.as_str(), "call permitted");

            config
                .event_listeners
                .emit(&CircuitBreakerEvent::CallPermitted {
                    name: name.to_string(),
                    timestamp: std::time::Instant::now(),
                    state: self.state,
                });
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!(breaker = name, state = self.state.as_str(), "call rejected");

            #[cfg(feature = "metrics")]
            counter!("circuitbreaker_calls_total", "breaker" => name.to_string(), "outcome" => "rejected")
                .increment(1);

            config
                .event_listeners
                .emit(&CircuitBreakerEvent::CallRejected {
                    name: name.to_string(),
                    timestamp: std::time::Instant::now(),
                });
        }

        permitted
    }

    pub(crate) fn record_success(&mut self, name: &str, config: &BreakerConfig) {
        if self.state == CircuitState::Open {
            // Late result from a call admitted before the circuit opened.
            return;
        }

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                name: name.to_string(),
                timestamp: std::time::Instant::now(),
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "breaker" => name.to_string(), "outcome" => "success")
            .increment(1);

        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
                self.consecutive_successes += 1;
                if self.consecutive_successes >= config.success_threshold {
                    self.transition_to(CircuitState::Closed, name, config);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub(crate) fn record_failure(&mut self, name: &str, config: &BreakerConfig) {
        if self.state == CircuitState::Open {
            return;
        }

        self.consecutive_failures += 1;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                name: name.to_string(),
                timestamp: std::time::Instant::now(),
                state: self.state,
                consecutive_failures: self.consecutive_failures,
            });

        #[cfg(feature = "tracing")]
        tracing::debug!(
            breaker = name,
            state = self.state.as_str(),
            consecutive_failures = self.consecutive_failures,
            "failure recorded"
        );

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "breaker" => name.to_string(), "outcome" => "failure")
            .increment(1);

        match self.state {
            CircuitState::Closed => {
                if self.consecutive_failures >= config.failure_threshold {
                    self.transition_to(CircuitState::Open, name, config);
                }
            }
            CircuitState::HalfOpen => {
                self.transition_to(CircuitState::Open, name, config);
            }
            CircuitState::Open => {}
        }
    }

    /// Releases a half-open slot without touching the counters.
    pub(crate) fn record_ignored(&mut self, name: &str, config: &BreakerConfig) {
        if self.state == CircuitState::HalfOpen {
            self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
        }

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "breaker" => name.to_string(), "outcome" => "ignored")
            .increment(1);

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::IgnoredError {
                name: name.to_string(),
                timestamp: std::time::Instant::now(),
            });
    }

    /// Gives back a half-open slot for a call whose outcome was never reported.
    pub(crate) fn release(&mut self) {
        if self.state == CircuitState::HalfOpen {
            self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
        }
    }

    pub(crate) fn force_open(&mut self, name: &str, config: &BreakerConfig) {
        self.transition_to(CircuitState::Open, name, config);
    }

    pub(crate) fn reset(&mut self, name: &str, config: &BreakerConfig) {
        self.transition_to(CircuitState::Closed, name, config);
        self.clear_counters();
    }

    fn clear_counters(&mut self) {
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.half_open_in_flight = 0;
    }

    fn transition_to(&mut self, state: CircuitState, name: &str, config: &BreakerConfig) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                name: name.to_string(),
                timestamp: std::time::Instant::now(),
                from_state,
                to_state: state,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = name,
            from = from_state.as_str(),
            to = state.as_str(),
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "breaker" => name.to_string(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);

            gauge!("circuitbreaker_state", "breaker" => name.to_string()).set(state as u8 as f64);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.clear_counters();
    }
}
