use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::gate::DEFAULT_POOL_SIZE;
use crate::Result;

/// Options for a [`ConnectionPool`](crate::ConnectionPool).
///
/// All settings have sane defaults if omitted.
///
/// ```
/// use sling::PoolConfig;
///
/// let config = PoolConfig::builder().pool_size(4).build();
/// assert_eq!(config.effective_pool_size(), 4);
/// assert!(!config.skip_ssl_validation);
/// ```
#[derive(TypedBuilder, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[builder(field_defaults(default))]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Maximum number of requests in flight, and of idle connections kept
    /// per host.
    ///
    /// Zero means [`DEFAULT_POOL_SIZE`].
    #[serde(default = "default_pool_size")]
    #[builder(default = DEFAULT_POOL_SIZE)]
    pub pool_size: usize,

    /// When `true`, TLS certificates of the server are not verified.
    ///
    /// ## Warning
    ///
    /// Any certificate for any site will be trusted, including expired
    /// ones. Only use this against servers you control.
    #[serde(default)]
    pub skip_ssl_validation: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

const fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

impl PoolConfig {
    /// Parses a configuration from a TOML document, e.g.
    ///
    /// ```toml
    /// pool_size = 4
    /// skip_ssl_validation = true
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the document is not valid TOML or contains
    /// unknown or mistyped keys.
    pub fn from_toml(document: &str) -> Result<Self> {
        Ok(toml::from_str(document)?)
    }

    /// The pool size actually used, with zero mapped to [`DEFAULT_POOL_SIZE`]
    #[must_use]
    pub const fn effective_pool_size(&self) -> usize {
        if self.pool_size == 0 {
            DEFAULT_POOL_SIZE
        } else {
            self.pool_size
        }
    }
}
