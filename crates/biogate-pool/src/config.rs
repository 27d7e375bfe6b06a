use crate::PoolError;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Connection limits applied to every pooled client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// When false every request gets a throwaway client.
    pub enabled: bool,
    /// Idle keep-alive connections kept per host.
    pub max_keepalive: usize,
    /// Requests a single client may have in flight.
    pub max_connections: usize,
    /// How long an idle connection is kept.
    pub keepalive_expiry: Duration,
    /// Request timeout used when the caller does not give one.
    pub timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_keepalive: 20,
            max_connections: 100,
            keepalive_expiry: Duration::from_secs(30),
            timeout: Duration::from_secs(120),
        }
    }
}

/// A named set of trusted root certificates.
///
/// Two contexts are the same pool identity when their ids match.
#[derive(Clone)]
pub struct TlsContext {
    id: String,
    roots_pem: Arc<Vec<u8>>,
}

impl TlsContext {
    /// Creates a context trusting the PEM-encoded certificates in `roots_pem`.
    pub fn new(id: impl Into<String>, roots_pem: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            roots_pem: Arc::new(roots_pem.into()),
        }
    }

    /// Reads the PEM bundle at `path` once; the path becomes the id.
    ///
    /// Use this instead of [`TlsVerify::CaFile`] to keep file I/O off the
    /// request path.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|source| PoolError::CaFile {
            path: path.to_path_buf(),
            source,
        })?;
        reqwest::Certificate::from_pem_bundle(&pem).map_err(PoolError::Certificate)?;
        Ok(Self::new(path.display().to_string(), pem))
    }

    /// Returns the context's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn roots_pem(&self) -> &[u8] {
        &self.roots_pem
    }
}

impl PartialEq for TlsContext {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TlsContext {}

impl Hash for TlsContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsContext")
            .field("id", &self.id)
            .field("roots_pem_len", &self.roots_pem.len())
            .finish()
    }
}

/// How a client verifies server certificates. Part of the pool key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TlsVerify {
    /// Verify against the system roots (`true`) or not at all (`false`).
    Enabled(bool),
    /// Verify against the PEM bundle at this path, in addition to the system roots.
    ///
    /// The file is read with blocking I/O each time a client is built for it.
    CaFile(PathBuf),
    /// Verify against a caller-provided set of roots.
    Context(TlsContext),
}

impl Default for TlsVerify {
    fn default() -> Self {
        TlsVerify::Enabled(true)
    }
}

impl From<bool> for TlsVerify {
    fn from(verify: bool) -> Self {
        TlsVerify::Enabled(verify)
    }
}

impl From<PathBuf> for TlsVerify {
    fn from(path: PathBuf) -> Self {
        TlsVerify::CaFile(path)
    }
}

impl From<TlsContext> for TlsVerify {
    fn from(context: TlsContext) -> Self {
        TlsVerify::Context(context)
    }
}
