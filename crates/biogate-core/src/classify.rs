//! Error classification shared by the circuit breaker and retry controller.
//!
//! Both components decide what to do with a failure by looking at its
//! [`ErrorKind`] and, for HTTP failures, its status code. A [`ClassSet`]
//! names a set of such classes: the breaker uses one for "counts as a
//! failure" and one for "never counts", the retry policy uses one for
//! "retryable" and one for "excluded".

use std::collections::HashSet;

/// Coarse category of an outbound request failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ErrorKind {
    /// Establishing the connection took longer than the per-call timeout.
    ConnectTimeout,
    /// The upstream accepted the connection but did not answer in time.
    ReadTimeout,
    /// Connection refused, reset, DNS failure and similar transport errors.
    Connection,
    /// The upstream answered with a non-success HTTP status.
    HttpStatus,
    /// The response body could not be decoded.
    Decode,
    /// The request itself was malformed (bad URL, unserializable payload).
    InvalidRequest,
}

impl ErrorKind {
    /// Kinds that are transient at the transport level.
    pub const TRANSIENT: [ErrorKind; 3] = [
        ErrorKind::ConnectTimeout,
        ErrorKind::ReadTimeout,
        ErrorKind::Connection,
    ];

    /// Returns a stable lowercase label, used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectTimeout => "connect_timeout",
            ErrorKind::ReadTimeout => "read_timeout",
            ErrorKind::Connection => "connection",
            ErrorKind::HttpStatus => "http_status",
            ErrorKind::Decode => "decode",
            ErrorKind::InvalidRequest => "invalid_request",
        }
    }
}

/// Implemented by error types the pipeline can classify.
pub trait Classify {
    /// Returns the category of this failure.
    fn kind(&self) -> ErrorKind;

    /// Returns the HTTP status for [`ErrorKind::HttpStatus`] failures.
    fn status(&self) -> Option<u16> {
        None
    }
}

/// A set of error classes, matched by kind or by HTTP status code.
///
/// An error matches when its kind is in the set, or when it carries a status
/// code that is in the set. Adding [`ErrorKind::HttpStatus`] therefore
/// matches every status; adding individual codes matches only those.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassSet {
    kinds: HashSet<ErrorKind>,
    statuses: HashSet<u16>,
}

impl ClassSet {
    /// Creates an empty set that matches nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set that matches every error.
    pub fn all() -> Self {
        Self::new()
            .with_kinds(ErrorKind::TRANSIENT)
            .with_kinds([
                ErrorKind::HttpStatus,
                ErrorKind::Decode,
                ErrorKind::InvalidRequest,
            ])
    }

    /// Adds kinds to the set.
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.kinds.extend(kinds);
        self
    }

    /// Adds individual HTTP status codes to the set.
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.statuses.extend(statuses);
        self
    }

    /// Returns true if the error belongs to this set.
    pub fn matches<E: Classify + ?Sized>(&self, error: &E) -> bool {
        if self.kinds.contains(&error.kind()) {
            return true;
        }
        error
            .status()
            .map(|status| self.statuses.contains(&status))
            .unwrap_or(false)
    }

    /// Returns true if the set matches nothing.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty() && self.statuses.is_empty()
    }

    /// Returns true if the set contains the given kind.
    pub fn contains_kind(&self, kind: ErrorKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Returns true if the set contains the given status code.
    pub fn contains_status(&self, status: u16) -> bool {
        self.statuses.contains(&status)
    }
}
