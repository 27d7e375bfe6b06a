//! Errors returned to callers of the dispatcher.

use biogate_core::{Classify, ErrorKind, TransportError};
use biogate_ratelimiter::RateLimiterError;
use std::fmt;
use thiserror::Error;

/// Status used when an upstream could not be reached or kept failing.
pub const NETWORK_ERROR: u16 = 599;

/// Why a request failed, independent of the numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorReason {
    /// Offline mode is on and the response was not cached.
    Offline,
    /// The endpoint key is not registered.
    UnknownEndpoint,
    /// The request or its retry policy was malformed.
    InvalidRequest,
    /// The domain's rate limit was exceeded.
    RateLimited,
    /// The domain's circuit breaker is open.
    CircuitOpen,
    /// Transport failures or retryable statuses outlasted the retry policy.
    NetworkError,
    /// The upstream answered with a non-retryable status.
    UpstreamStatus,
    /// The upstream's response body could not be decoded.
    Decode,
}

impl ErrorReason {
    /// Returns a stable tag, used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReason::Offline => "offline",
            ErrorReason::UnknownEndpoint => "unknown_endpoint",
            ErrorReason::InvalidRequest => "invalid_request",
            ErrorReason::RateLimited => "rate_limited",
            ErrorReason::CircuitOpen => "circuit_open",
            ErrorReason::NetworkError => "network_error",
            ErrorReason::UpstreamStatus => "upstream_status",
            ErrorReason::Decode => "decode",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed request, with an HTTP-like status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} {reason}: {message}")]
pub struct RequestError {
    /// HTTP-like status code.
    pub code: u16,
    /// Human-readable description.
    pub message: String,
    /// Machine-readable reason.
    pub reason: ErrorReason,
}

impl RequestError {
    /// Creates an error from its parts.
    pub fn new(code: u16, reason: ErrorReason, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            reason,
        }
    }

    pub(crate) fn offline(url: &str) -> Self {
        Self::new(
            503,
            ErrorReason::Offline,
            format!("Offline mode enabled: no cached response for {url}"),
        )
    }

    pub(crate) fn unknown_endpoint(key: &str) -> Self {
        Self::new(
            400,
            ErrorReason::UnknownEndpoint,
            format!("unknown endpoint key '{key}'"),
        )
    }

    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(400, ErrorReason::InvalidRequest, message)
    }

    pub(crate) fn rate_limited(err: &RateLimiterError) -> Self {
        Self::new(429, ErrorReason::RateLimited, err.to_string())
    }

    pub(crate) fn circuit_open(domain: &str) -> Self {
        Self::new(
            503,
            ErrorReason::CircuitOpen,
            format!("circuit breaker open for '{domain}'"),
        )
    }

    pub(crate) fn network(message: impl Into<String>) -> Self {
        Self::new(NETWORK_ERROR, ErrorReason::NetworkError, message)
    }

    /// Maps the last transport failure of a request.
    ///
    /// `retryable` says whether the retry policy considered the failure
    /// retryable, in which case the request ran out of attempts.
    pub(crate) fn from_transport(err: &TransportError, retryable: bool) -> Self {
        if retryable {
            return Self::network(format!("request failed after retries: {err}"));
        }
        match err {
            TransportError::Status { status, .. } => {
                Self::new(*status, ErrorReason::UpstreamStatus, err.to_string())
            }
            TransportError::InvalidRequest(_) => Self::invalid_request(err.to_string()),
            TransportError::Decode(_) => {
                Self::new(NETWORK_ERROR, ErrorReason::Decode, err.to_string())
            }
            _ => Self::network(err.to_string()),
        }
    }

    /// Returns true if the request never reached the upstream.
    pub fn is_synthetic(&self) -> bool {
        matches!(
            self.reason,
            ErrorReason::Offline
                | ErrorReason::UnknownEndpoint
                | ErrorReason::InvalidRequest
                | ErrorReason::RateLimited
                | ErrorReason::CircuitOpen
        )
    }
}

impl Classify for RequestError {
    fn kind(&self) -> ErrorKind {
        match self.reason {
            ErrorReason::UpstreamStatus => ErrorKind::HttpStatus,
            ErrorReason::Decode => ErrorKind::Decode,
            ErrorReason::NetworkError => ErrorKind::Connection,
            _ => ErrorKind::InvalidRequest,
        }
    }

    fn status(&self) -> Option<u16> {
        (self.reason == ErrorReason::UpstreamStatus).then_some(self.code)
    }
}
