//! Provider configuration.
//!
//! ```rust
//! use std::time::Duration;
//! use http_provider::Config;
//!
//! let config = Config::default()
//!     .with_max_idle(64)
//!     .with_header_read_timeout(Some(Duration::from_secs(5)));
//! assert!(config.enable_release);
//! assert_eq!(config.max_idle, 64);
//! ```
use core::time::Duration;

/// Tunables for an [`HttpProvider`](crate::HttpProvider).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
#[non_exhaustive]
pub struct Config {
    /// Whether released objects return to their pool. Defaults to `true`.
    pub enable_release: bool,
    /// Maximum idle objects kept per pool. Defaults to 1024.
    pub max_idle: usize,
    /// Largest request body the server collects, in bytes. Defaults to 10 MiB.
    pub max_body_size: usize,
    /// Whether HTTP/1.1 connections are kept alive. Defaults to `true`.
    pub keep_alive: bool,
    /// How long a client may take to send request headers. Defaults to 30s.
    pub header_read_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_release: true,
            max_idle: 1024,
            max_body_size: 10 * 1024 * 1024,
            keep_alive: true,
            header_read_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl Config {
    /// Sets [`Config::enable_release`].
    #[must_use]
    pub fn with_enable_release(mut self, enabled: bool) -> Self {
        self.enable_release = enabled;
        self
    }

    /// Sets [`Config::max_idle`].
    #[must_use]
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Sets [`Config::max_body_size`].
    #[must_use]
    pub fn with_max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }

    /// Sets [`Config::keep_alive`].
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets [`Config::header_read_timeout`].
    #[must_use]
    pub fn with_header_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.header_read_timeout = timeout;
        self
    }
}
