use crate::client::PooledClient;
use crate::config::{PoolConfig, TlsVerify};
use crate::PoolError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

tokio::task_local! {
    static CURRENT: ExecutionContext;
}

type ContextPools = HashMap<TlsVerify, Arc<PooledClient>>;

/// Owns the pooled clients of every live execution context.
#[derive(Debug)]
pub struct PoolManager {
    config: PoolConfig,
    pools: Mutex<HashMap<u64, ContextPools>>,
    next_context: AtomicU64,
}

impl PoolManager {
    /// Creates a manager applying `config` to every client it builds.
    pub fn new(config: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            pools: Mutex::new(HashMap::new()),
            next_context: AtomicU64::new(1),
        })
    }

    /// Returns the manager's configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Opens a new execution context.
    ///
    /// Pools created while the context is current belong to it and are
    /// closed when its last clone is dropped.
    pub fn context(self: &Arc<Self>) -> ExecutionContext {
        let id = self.next_context.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "tracing")]
        tracing::debug!(context = id, "execution context opened");

        ExecutionContext {
            inner: Arc::new(ContextInner {
                id,
                manager: Arc::downgrade(self),
            }),
        }
    }

    /// Returns a client for `verify`.
    ///
    /// Inside an execution context of this manager, with pooling enabled, the
    /// same client is returned for the same `verify` until it is closed.
    /// Otherwise a throwaway client without keep-alive is built.
    pub fn get_pool(
        &self,
        verify: &TlsVerify,
        timeout: Option<Duration>,
    ) -> Result<Arc<PooledClient>, PoolError> {
        let context = self.current_context_id();
        let context = match context {
            Some(id) if self.config.enabled => id,
            _ => {
                return PooledClient::build(&self.config, verify, timeout, false).map(Arc::new);
            }
        };

        if let Some(client) = self.live_client(context, verify) {
            return Ok(client);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(context, ?verify, "creating pooled client");

        // Built without the lock held: a CA file read blocks.
        let client = Arc::new(PooledClient::build(&self.config, verify, timeout, true)?);

        let mut pools = self.lock();
        let entry = pools.entry(context).or_default();
        if let Some(existing) = entry.get(verify).filter(|existing| !existing.is_closed()) {
            return Ok(Arc::clone(existing));
        }
        entry.insert(verify.clone(), Arc::clone(&client));
        Ok(client)
    }

    fn live_client(&self, context: u64, verify: &TlsVerify) -> Option<Arc<PooledClient>> {
        self.lock()
            .get(&context)
            .and_then(|pools| pools.get(verify))
            .filter(|client| !client.is_closed())
            .map(Arc::clone)
    }

    /// Closes every tracked client and forgets all contexts' pools.
    pub fn close_all(&self) {
        let pools: Vec<ContextPools> = self.lock().drain().map(|(_, pools)| pools).collect();
        for client in pools.iter().flat_map(|pools| pools.values()) {
            client.close();
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(contexts = pools.len(), "closed all pools");
    }

    /// Returns the number of contexts that currently own pools.
    pub fn context_count(&self) -> usize {
        self.lock().len()
    }

    /// Returns the number of pooled clients across all contexts.
    pub fn pool_count(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    fn current_context_id(&self) -> Option<u64> {
        CURRENT
            .try_with(|ctx| {
                std::ptr::eq(ctx.inner.manager.as_ptr(), self).then_some(ctx.inner.id)
            })
            .ok()
            .flatten()
    }

    fn release(&self, context: u64) {
        let pools = self.lock().remove(&context);
        if let Some(pools) = pools {
            #[cfg(feature = "tracing")]
            tracing::debug!(context, pools = pools.len(), "releasing context pools");

            for client in pools.values() {
                client.close();
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, ContextPools>> {
        self.pools.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A unit of work that owns its pooled clients.
///
/// Cloning is cheap; pools are released when the last clone is dropped.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    id: u64,
    manager: Weak<PoolManager>,
}

impl ExecutionContext {
    /// Returns the context's id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Runs `fut` with this context as the current one.
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        CURRENT.scope(self.clone(), fut).await
    }

    /// Returns the current context, if any.
    pub fn current() -> Option<ExecutionContext> {
        CURRENT.try_with(Clone::clone).ok()
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.release(self.id);
        }
    }
}
