use crate::config::{PoolConfig, TlsVerify};
use crate::PoolError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// An HTTP client plus its connection limit.
///
/// A closed client is never handed out again by the manager.
#[derive(Debug)]
pub struct PooledClient {
    client: reqwest::Client,
    verify: TlsVerify,
    pooled: bool,
    closed: AtomicBool,
    slots: Arc<Semaphore>,
}

/// A connection slot held for the duration of one request.
#[derive(Debug)]
pub struct ConnectionSlot {
    _permit: OwnedSemaphorePermit,
}

impl PooledClient {
    pub(crate) fn build(
        config: &PoolConfig,
        verify: &TlsVerify,
        timeout: Option<Duration>,
        pooled: bool,
    ) -> Result<Self, PoolError> {
        let mut builder = reqwest::Client::builder().timeout(timeout.unwrap_or(config.timeout));

        builder = if pooled {
            builder
                .pool_max_idle_per_host(config.max_keepalive)
                .pool_idle_timeout(config.keepalive_expiry)
        } else {
            builder.pool_max_idle_per_host(0)
        };

        builder = match verify {
            TlsVerify::Enabled(true) => builder,
            TlsVerify::Enabled(false) => builder.danger_accept_invalid_certs(true),
            TlsVerify::CaFile(path) => {
                let pem = std::fs::read(path).map_err(|source| PoolError::CaFile {
                    path: path.clone(),
                    source,
                })?;
                add_roots(builder, &pem)?
            }
            TlsVerify::Context(context) => add_roots(builder, context.roots_pem())?,
        };

        let client = builder.build().map_err(PoolError::Build)?;
        Ok(Self {
            client,
            verify: verify.clone(),
            pooled,
            closed: AtomicBool::new(false),
            slots: Arc::new(Semaphore::new(config.max_connections.max(1))),
        })
    }

    /// Returns the underlying HTTP client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Returns the TLS settings this client was built with.
    pub fn verify(&self) -> &TlsVerify {
        &self.verify
    }

    /// Returns true if this client keeps connections alive between requests.
    pub fn is_pooled(&self) -> bool {
        self.pooled
    }

    /// Returns true once the client has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Waits for a free connection slot.
    pub async fn acquire(&self) -> Result<ConnectionSlot, PoolError> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        Ok(ConnectionSlot { _permit: permit })
    }

    /// Returns the number of free connection slots.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Closes the client; waiting and future acquires fail.
    ///
    /// Requests already holding a slot run to completion.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.slots.close();
    }
}

fn add_roots(
    mut builder: reqwest::ClientBuilder,
    pem: &[u8],
) -> Result<reqwest::ClientBuilder, PoolError> {
    let certs = reqwest::Certificate::from_pem_bundle(pem).map_err(PoolError::Certificate)?;
    for cert in certs {
        builder = builder.add_root_certificate(cert);
    }
    Ok(builder)
}
