//! Transport error taxonomy.
//!
//! [`TransportError`] is what a single outbound attempt produces when it
//! fails. The retry controller and circuit breaker never look at the
//! message; they classify the error through [`Classify`].

use crate::classify::{Classify, ErrorKind};
use thiserror::Error;

/// Failure of a single outbound HTTP attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be established within the timeout.
    #[error("connect timeout: {0}")]
    ConnectTimeout(String),

    /// No response was received within the timeout.
    #[error("read timeout: {0}")]
    ReadTimeout(String),

    /// Connection refused, reset or otherwise broken.
    #[error("connection error: {0}")]
    Connection(String),

    /// The upstream answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Builds a status error, truncating the body to a loggable size.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.len() > 512 {
            let mut cut = 512;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        TransportError::Status { status, body }
    }

    /// Returns true for connect/read timeouts and connection errors.
    pub fn is_transient_transport(&self) -> bool {
        ErrorKind::TRANSIENT.contains(&self.kind())
    }
}

impl Classify for TransportError {
    fn kind(&self) -> ErrorKind {
        match self {
            TransportError::ConnectTimeout(_) => ErrorKind::ConnectTimeout,
            TransportError::ReadTimeout(_) => ErrorKind::ReadTimeout,
            TransportError::Connection(_) => ErrorKind::Connection,
            TransportError::Status { .. } => ErrorKind::HttpStatus,
            TransportError::Decode(_) => ErrorKind::Decode,
            TransportError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
