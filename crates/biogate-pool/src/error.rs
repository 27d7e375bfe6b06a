use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the pool manager.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// The CA bundle could not be read.
    #[error("failed to read CA bundle {path}: {source}")]
    CaFile {
        /// Path of the bundle.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A certificate could not be parsed.
    #[error("invalid certificate: {0}")]
    Certificate(#[source] reqwest::Error),

    /// The client was closed while waiting for a connection slot.
    #[error("connection pool is closed")]
    Closed,
}
