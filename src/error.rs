//! Error types.
//!
//! Every fallible operation in this crate returns [`Result`], whose error is
//! the [`Error`] enum below. The variants follow the places where something
//! can actually go wrong:
//!
//! - **Listener errors** ([`Error::Bind`], [`Error::Accept`], TLS loading)
//!   end the accept loop they were raised in
//! - **I/O errors** ([`Error::Io`]) surface from header serialisation and
//!   body reads, and are never retried
//! - **Payload errors** ([`Error::Form`], [`Error::Utf8`],
//!   [`Error::BodyTooLarge`], [`Error::BodyClosed`]) describe a request body
//!   that could not be used
//!
//! Pool exhaustion is not an error: pools fall back to fresh allocation.
//!
//! # Examples
//!
//! ```rust
//! use http_provider::{Body, Error};
//!
//! let mut body = Body::from("once");
//! body.close();
//! assert!(matches!(body.into_bytes(), Err(Error::BodyClosed)));
//! ```
use std::io;
#[cfg(feature = "tls")]
use std::path::PathBuf;

/// A specialized `Result` type for this crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The error type of this crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The listener could not bind to its address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The requested address.
        addr: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The listener broke while accepting. Resource exhaustion is retried
    /// instead.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// A certificate or private key could not be loaded.
    #[cfg(feature = "tls")]
    #[error("failed to load TLS material from {}: {reason}", path.display())]
    Tls {
        /// The file being loaded.
        path: PathBuf,
        /// Why loading failed.
        reason: String,
    },

    /// The certificate and key were rejected by the TLS stack.
    #[cfg(feature = "tls")]
    #[error("invalid TLS configuration: {0}")]
    TlsConfig(#[from] tokio_rustls::rustls::Error),

    /// An I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Form data could not be decoded.
    #[cfg(feature = "form")]
    #[error("malformed form data: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    /// The body was not valid UTF-8.
    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] core::str::Utf8Error),

    /// The body exceeded the configured maximum size.
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge {
        /// The configured limit.
        limit: usize,
    },

    /// The body was already closed or taken.
    #[error("body was closed, it may have been consumed by `take()`")]
    BodyClosed,
}
