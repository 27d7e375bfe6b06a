//! Property-based tests.
//!
//! These generate random configurations and call sequences and check the
//! invariants each component promises.

pub mod cache;
pub mod circuit_breaker;
pub mod fingerprint;
pub mod rate_limiter;
