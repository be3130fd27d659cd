//! Connection pools.
//!
//! A [`ConnectionPool`] owns one transport and one admission gate. Every
//! [`HttpClient`] created from it shares both, so the concurrency limit holds
//! across all clients of the pool, whatever their base URL.

mod config;

pub use config::PoolConfig;

use std::sync::Arc;

use crate::{ErrorKind, Executor, HttpClient, Result, ThrottledExecutor};

/// A throttled transport shared by many clients.
///
/// Cloning is cheap and clones share the transport and the gate.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    config: PoolConfig,
    executor: Arc<dyn Executor>,
}

impl ConnectionPool {
    /// Creates a pool backed by a new [`reqwest::Client`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the TLS backend cannot be initialized.
    pub fn new(config: PoolConfig) -> Result<Self> {
        let pool_size = config.effective_pool_size();
        let client = reqwest::ClientBuilder::new()
            .pool_max_idle_per_host(pool_size)
            .danger_accept_invalid_certs(config.skip_ssl_validation)
            .build()
            .map_err(ErrorKind::BuildClient)?;

        log::debug!(
            "Created connection pool (size: {pool_size}, skip SSL validation: {})",
            config.skip_ssl_validation
        );
        Ok(Self::with_executor(config, client))
    }

    /// Creates a pool which sends requests through `executor`.
    ///
    /// `executor` is wrapped in a [`ThrottledExecutor`] sized by `config`.
    /// TLS settings in `config` are up to the executor.
    #[must_use]
    pub fn with_executor<E: Executor + 'static>(config: PoolConfig, executor: E) -> Self {
        let executor = ThrottledExecutor::new(executor, config.effective_pool_size());
        Self {
            config,
            executor: Arc::new(executor),
        }
    }

    /// The configuration this pool was created with
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Creates a client for `base_url` sharing this pool.
    ///
    /// `base_url` is not validated here. If it cannot be parsed, every
    /// request sent through the client fails with
    /// [`ErrorKind::MalformedUrl`]. Use [`ConnectionPool::try_http`] to fail
    /// early instead.
    #[must_use]
    pub fn http(&self, base_url: &str) -> HttpClient {
        HttpClient::permissive(base_url, Arc::clone(&self.executor))
    }

    /// Creates a client for `base_url` sharing this pool.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if `base_url` is not an absolute `http` or `https`
    /// URL.
    pub fn try_http(&self, base_url: &str) -> Result<HttpClient> {
        HttpClient::new(base_url, Arc::clone(&self.executor))
    }
}

/// Creates a client for `base_url` with a connection pool of its own.
///
/// # Errors
///
/// Returns an `Err` if `base_url` is not an absolute `http` or `https` URL,
/// or if the pool cannot be created.
pub fn new_http(base_url: &str, config: PoolConfig) -> Result<HttpClient> {
    ConnectionPool::new(config)?.try_http(base_url)
}
