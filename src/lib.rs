#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]
//! A pluggable HTTP provider layer with pooled request objects.
//!
//! Handlers are written against abstract traits ([`Context`], [`Request`],
//! [`Response`], [`Header`], [`Values`]) instead of a concrete HTTP library.
//! A [`Provider`] supplies the concrete objects, reuses them through
//! thread-safe pools, and runs the server that feeds them to a [`Handler`].
//!
//! The bundled [`HttpProvider`] serves HTTP/1 through hyper and tokio.
//!
//! # Features
//!
//! - **Abstract request model** - handlers only see trait objects, so a
//!   different provider can be swapped in without touching them
//! - **Pooled objects** - contexts, requests and responses are reset and
//!   reused instead of reallocated for every request
//! - **Native fast path** - a [`NativeHandler`] works directly on the
//!   transport's [`RawRequest`] and [`ResponseBuffer`] when they are
//!   available, and through [`convert`] otherwise
//! - **Registration point** - [`register_provider`] installs the provider the
//!   free functions ([`listen_and_serve`], [`acquire_context`], ...) use
//!
//! # Optional Features
//!
//! - `form` - form parsing via serde_urlencoded (enabled by default)
//! - `serde` - deserializing [`Config`] (enabled by default)
//! - `tls` - serving over TLS via tokio-rustls (enabled by default)
//!
//! # Examples
//!
//! ## Serving a handler
//!
//! ```rust,no_run
//! use http_provider::{Context, HandlerFunc, StatusCode, Values};
//!
//! # async fn example() -> http_provider::Result<()> {
//! let hello = HandlerFunc::new(|ctx: &mut dyn Context| {
//!     let name = ctx.request().form().value("name").to_owned();
//!     ctx.response().header_mut().add("Content-Type", "text/plain");
//!     ctx.response().write_header(StatusCode::OK);
//!     let _ = ctx.response().write(format!("hello {name}").as_bytes());
//! });
//!
//! http_provider::listen_and_serve("127.0.0.1:8080", hello).await
//! # }
//! ```
//!
//! ## Working on native objects
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use http_provider::{HttpProvider, RawRequest, ResponseWriter};
//!
//! # async fn example() -> http_provider::Result<()> {
//! let provider = Arc::new(HttpProvider::new());
//! let echo = provider.native_handler_func(|writer: &mut dyn ResponseWriter, request: &mut RawRequest| {
//!     let _ = writer.write(request.method.as_str().as_bytes());
//! });
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
//! provider.serve(listener, echo).await
//! # }
//! ```

mod pool;

pub mod error;
pub use error::{Error, Result};

pub mod values;
pub use values::{Canonical, Casing, Exact, FormValues, HeaderValues, ValueMap, Values};

pub mod header;
pub use header::Header;

mod body;
pub use body::Body;

pub mod config;
pub use config::Config;

pub mod request;
#[doc(inline)]
pub use request::{
    ConnInfo, FileHeader, HttpRequest, MultipartForm, RawRequest, Request, RequestContext, TlsInfo,
};

pub mod response;
#[doc(inline)]
pub use response::{HttpResponse, Response, ResponseBuffer, ResponseWriter};

pub mod context;
#[doc(inline)]
pub use context::{Backend, Context, HttpContext};

pub mod handler;
#[doc(inline)]
pub use handler::{Handler, HandlerFunc, Native, NativeHandler, NativeHandlerFunc};

pub mod convert;

pub mod provider;
#[doc(inline)]
pub use provider::{
    acquire_context, acquire_request, acquire_response, current_provider, listen_and_serve,
    native_handler, native_handler_func, register_provider, release_context, release_request,
    release_response, set_enable_release, AnyProvider, HttpProvider, Provider, ServeFuture,
};
#[cfg(feature = "tls")]
pub use provider::listen_and_serve_tls;

mod server;
#[cfg(feature = "tls")]
pub use server::load_tls_acceptor;
#[cfg(feature = "tls")]
pub use tokio_rustls::TlsAcceptor;

pub use http::{Method, StatusCode, Uri, Version};
