//! Pooled HTTP clients scoped to execution contexts.
//!
//! A [`PoolManager`] hands out [`PooledClient`]s keyed by their TLS
//! verification settings. Clients are only shared within an
//! [`ExecutionContext`]; outside one (or with pooling disabled) every call
//! gets a throwaway client with keep-alive turned off. When the last clone of
//! a context is dropped, its clients are closed and forgotten.
//!
//! ```rust
//! use biogate_pool::{PoolConfig, PoolManager, TlsVerify};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), biogate_pool::PoolError> {
//! let manager = PoolManager::new(PoolConfig::default());
//! let ctx = manager.context();
//!
//! ctx.scope(async {
//!     let a = manager.get_pool(&TlsVerify::default(), None)?;
//!     let b = manager.get_pool(&TlsVerify::default(), None)?;
//!     assert!(Arc::ptr_eq(&a, &b));
//!     Ok::<_, biogate_pool::PoolError>(())
//! })
//! .await?;
//!
//! drop(ctx);
//! assert_eq!(manager.pool_count(), 0);
//! # Ok(())
//! # }
//! ```

pub use client::{ConnectionSlot, PooledClient};
pub use config::{PoolConfig, TlsContext, TlsVerify};
pub use error::PoolError;
pub use manager::{ExecutionContext, PoolManager};

mod client;
mod config;
mod error;
mod manager;
