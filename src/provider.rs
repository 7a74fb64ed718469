//! Providers and the process-wide registration point.
//!
//! A [`Provider`] owns the pools that [`Context`], [`Request`] and
//! [`Response`] objects are drawn from, and runs the server loop that feeds
//! them to a [`Handler`]. [`HttpProvider`] is the bundled implementation on
//! top of hyper.
//!
//! The free functions of this module ([`acquire_context`],
//! [`listen_and_serve`], ...) delegate to the provider installed with
//! [`register_provider`]. When none was installed, [`HttpProvider::global`]
//! is registered on first use.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use http_provider::{Context, HttpProvider, Provider, Values};
//!
//! let provider = Arc::new(HttpProvider::new());
//! let mut ctx = provider.acquire_context();
//! ctx.request().header_mut().add("X-Id", "1");
//! provider.release_context(ctx);
//!
//! // The released context is reused, already reset.
//! let mut ctx = provider.acquire_context();
//! assert!(!ctx.request().header().has("X-Id"));
//! ```
use core::any::Any;
use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "tls")]
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::config::Config;
use crate::context::{Context, HttpContext};
use crate::error::Result;
use crate::handler::{Handler, Native, NativeHandler, NativeHandlerFunc};
use crate::pool::Pool;
use crate::request::{HttpRequest, RawRequest, Request};
use crate::response::{HttpResponse, Response, ResponseWriter};

/// The future returned by the `listen_and_serve` family.
pub type ServeFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// A source of pooled request objects and the server that uses them.
///
/// Objects handed out by `acquire_*` go back through the matching
/// `release_*`, which resets them. All methods may be called concurrently.
pub trait Provider: Send + Sync + 'static {
    /// The context type.
    type Context: Context;
    /// The request type.
    type Request: Request;
    /// The response type.
    type Response: Response;

    /// Takes a context from the pool, or builds one.
    fn acquire_context(&self) -> Box<Self::Context>;
    /// Takes a request from the pool, or builds one.
    fn acquire_request(&self) -> Box<Self::Request>;
    /// Takes a response from the pool, or builds one.
    fn acquire_response(&self) -> Box<Self::Response>;

    /// Resets `ctx` and returns it to the pool.
    fn release_context(&self, ctx: Box<Self::Context>);
    /// Resets `request` and returns it to the pool.
    fn release_request(&self, request: Box<Self::Request>);
    /// Resets `response` and returns it to the pool.
    fn release_response(&self, response: Box<Self::Response>);

    /// Turns pooling on or off. While off, released objects are dropped
    /// without being reset.
    fn set_enable_release(&self, enabled: bool);

    /// Binds `addr` and serves `handler` until the listener fails.
    fn listen_and_serve(self: Arc<Self>, addr: String, handler: Arc<dyn Handler>) -> ServeFuture;

    /// Binds `addr` and serves `handler` over TLS until the listener fails.
    #[cfg(feature = "tls")]
    fn listen_and_serve_tls(
        self: Arc<Self>,
        addr: String,
        cert_file: PathBuf,
        key_file: PathBuf,
        handler: Arc<dyn Handler>,
    ) -> ServeFuture;
}

pub(crate) trait ProviderImpl: Send + Sync + 'static {
    fn acquire_context_inner(&self) -> Box<dyn Context>;
    fn acquire_request_inner(&self) -> Box<dyn Request>;
    fn acquire_response_inner(&self) -> Box<dyn Response>;
    fn release_context_inner(&self, ctx: Box<dyn Context>);
    fn release_request_inner(&self, request: Box<dyn Request>);
    fn release_response_inner(&self, response: Box<dyn Response>);
    fn set_enable_release_inner(&self, enabled: bool);
    fn listen_and_serve_inner(
        self: Arc<Self>,
        addr: String,
        handler: Arc<dyn Handler>,
    ) -> ServeFuture;
    #[cfg(feature = "tls")]
    fn listen_and_serve_tls_inner(
        self: Arc<Self>,
        addr: String,
        cert_file: PathBuf,
        key_file: PathBuf,
        handler: Arc<dyn Handler>,
    ) -> ServeFuture;
    fn name(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

fn foreign(provider: &'static str, kind: &'static str) {
    tracing::warn!(
        provider,
        kind,
        "dropping object released into a provider that did not create it"
    );
}

impl<P: Provider> ProviderImpl for P {
    fn acquire_context_inner(&self) -> Box<dyn Context> {
        Provider::acquire_context(self)
    }

    fn acquire_request_inner(&self) -> Box<dyn Request> {
        Provider::acquire_request(self)
    }

    fn acquire_response_inner(&self) -> Box<dyn Response> {
        Provider::acquire_response(self)
    }

    fn release_context_inner(&self, ctx: Box<dyn Context>) {
        let ctx: Box<dyn Any> = ctx;
        match ctx.downcast::<P::Context>() {
            Ok(ctx) => Provider::release_context(self, ctx),
            Err(_) => foreign(self.name(), "context"),
        }
    }

    fn release_request_inner(&self, request: Box<dyn Request>) {
        let request: Box<dyn Any> = request;
        match request.downcast::<P::Request>() {
            Ok(request) => Provider::release_request(self, request),
            Err(_) => foreign(self.name(), "request"),
        }
    }

    fn release_response_inner(&self, response: Box<dyn Response>) {
        let response: Box<dyn Any> = response;
        match response.downcast::<P::Response>() {
            Ok(response) => Provider::release_response(self, response),
            Err(_) => foreign(self.name(), "response"),
        }
    }

    fn set_enable_release_inner(&self, enabled: bool) {
        Provider::set_enable_release(self, enabled);
    }

    fn listen_and_serve_inner(
        self: Arc<Self>,
        addr: String,
        handler: Arc<dyn Handler>,
    ) -> ServeFuture {
        Provider::listen_and_serve(self, addr, handler)
    }

    #[cfg(feature = "tls")]
    fn listen_and_serve_tls_inner(
        self: Arc<Self>,
        addr: String,
        cert_file: PathBuf,
        key_file: PathBuf,
        handler: Arc<dyn Handler>,
    ) -> ServeFuture {
        Provider::listen_and_serve_tls(self, addr, cert_file, key_file, handler)
    }
}

/// A type-erased, shareable [`Provider`].
///
/// Objects go in and out as trait objects. Releasing an object the provider
/// did not create logs a warning and drops it.
#[derive(Clone)]
pub struct AnyProvider(Arc<dyn ProviderImpl>);

impl fmt::Debug for AnyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("AnyProvider[{}]", self.name()))
    }
}

impl<P: Provider> From<Arc<P>> for AnyProvider {
    fn from(provider: Arc<P>) -> Self {
        Self(provider)
    }
}

impl AnyProvider {
    /// Erases the type of `provider`.
    pub fn new<P: Provider>(provider: Arc<P>) -> Self {
        Self(provider)
    }

    /// Type name of the underlying provider.
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// See [`Provider::acquire_context`].
    pub fn acquire_context(&self) -> Box<dyn Context> {
        self.0.acquire_context_inner()
    }

    /// See [`Provider::acquire_request`].
    pub fn acquire_request(&self) -> Box<dyn Request> {
        self.0.acquire_request_inner()
    }

    /// See [`Provider::acquire_response`].
    pub fn acquire_response(&self) -> Box<dyn Response> {
        self.0.acquire_response_inner()
    }

    /// See [`Provider::release_context`].
    pub fn release_context(&self, ctx: Box<dyn Context>) {
        self.0.release_context_inner(ctx);
    }

    /// See [`Provider::release_request`].
    pub fn release_request(&self, request: Box<dyn Request>) {
        self.0.release_request_inner(request);
    }

    /// See [`Provider::release_response`].
    pub fn release_response(&self, response: Box<dyn Response>) {
        self.0.release_response_inner(response);
    }

    /// See [`Provider::set_enable_release`].
    pub fn set_enable_release(&self, enabled: bool) {
        self.0.set_enable_release_inner(enabled);
    }

    /// See [`Provider::listen_and_serve`].
    pub fn listen_and_serve(&self, addr: impl Into<String>, handler: impl Handler) -> ServeFuture {
        Arc::clone(&self.0).listen_and_serve_inner(addr.into(), Arc::new(handler))
    }

    /// See [`Provider::listen_and_serve_tls`].
    #[cfg(feature = "tls")]
    pub fn listen_and_serve_tls(
        &self,
        addr: impl Into<String>,
        cert_file: impl Into<PathBuf>,
        key_file: impl Into<PathBuf>,
        handler: impl Handler,
    ) -> ServeFuture {
        Arc::clone(&self.0).listen_and_serve_tls_inner(
            addr.into(),
            cert_file.into(),
            key_file.into(),
            Arc::new(handler),
        )
    }
}

#[derive(Debug)]
pub(crate) struct Pools {
    contexts: Pool<HttpContext>,
    requests: Pool<HttpRequest>,
    responses: Pool<HttpResponse>,
    release_enabled: AtomicBool,
}

impl Pools {
    fn new(config: &Config) -> Arc<Self> {
        Arc::new(Self {
            contexts: Pool::new(config.max_idle),
            requests: Pool::new(config.max_idle),
            responses: Pool::new(config.max_idle),
            release_enabled: AtomicBool::new(config.enable_release),
        })
    }

    pub(crate) fn acquire_context(self: &Arc<Self>) -> Box<HttpContext> {
        self.contexts.get_or_else(|| HttpContext::new(self))
    }

    pub(crate) fn acquire_request(&self) -> Box<HttpRequest> {
        self.requests.get_or_else(HttpRequest::new)
    }

    pub(crate) fn acquire_response(&self) -> Box<HttpResponse> {
        self.responses.get_or_else(HttpResponse::new)
    }

    fn release_enabled(&self) -> bool {
        self.release_enabled.load(Ordering::Acquire)
    }

    pub(crate) fn release_context(&self, mut ctx: Box<HttpContext>) {
        if self.release_enabled() {
            ctx.reset();
            self.contexts.put(ctx);
        }
    }

    pub(crate) fn release_request(&self, mut request: Box<HttpRequest>) {
        if self.release_enabled() {
            request.reset();
            self.requests.put(request);
        }
    }

    pub(crate) fn release_response(&self, mut response: Box<HttpResponse>) {
        if self.release_enabled() {
            response.reset();
            self.responses.put(response);
        }
    }
}

/// The bundled [`Provider`], serving HTTP/1 through hyper.
#[derive(Debug)]
pub struct HttpProvider {
    pools: Arc<Pools>,
    config: Config,
}

static GLOBAL: LazyLock<Arc<HttpProvider>> = LazyLock::new(|| Arc::new(HttpProvider::new()));

impl Default for HttpProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpProvider {
    /// Creates a provider with the default [`Config`].
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a provider with `config`.
    pub fn with_config(config: Config) -> Self {
        Self {
            pools: Pools::new(&config),
            config,
        }
    }

    /// The process-wide instance registered when nothing else is.
    pub fn global() -> &'static Arc<HttpProvider> {
        &GLOBAL
    }

    /// The configuration this provider was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of pooled contexts.
    pub fn idle_contexts(&self) -> usize {
        self.pools.contexts.idle()
    }

    /// Number of pooled requests.
    pub fn idle_requests(&self) -> usize {
        self.pools.requests.idle()
    }

    /// Number of pooled responses.
    pub fn idle_responses(&self) -> usize {
        self.pools.responses.idle()
    }

    /// Wraps a [`NativeHandler`] into a [`Handler`].
    ///
    /// Same as the free [`native_handler`].
    pub fn native_handler<H: NativeHandler>(&self, handler: H) -> Native<H> {
        native_handler(handler)
    }

    /// Wraps a native closure into a [`Handler`].
    pub fn native_handler_func<F>(&self, f: F) -> Native<NativeHandlerFunc<F>>
    where
        F: Fn(&mut dyn ResponseWriter, &mut RawRequest) + Send + Sync + 'static,
    {
        native_handler_func(f)
    }
}

impl Provider for HttpProvider {
    type Context = HttpContext;
    type Request = HttpRequest;
    type Response = HttpResponse;

    fn acquire_context(&self) -> Box<HttpContext> {
        self.pools.acquire_context()
    }

    fn acquire_request(&self) -> Box<HttpRequest> {
        self.pools.acquire_request()
    }

    fn acquire_response(&self) -> Box<HttpResponse> {
        self.pools.acquire_response()
    }

    fn release_context(&self, ctx: Box<HttpContext>) {
        self.pools.release_context(ctx);
    }

    fn release_request(&self, request: Box<HttpRequest>) {
        self.pools.release_request(request);
    }

    fn release_response(&self, response: Box<HttpResponse>) {
        self.pools.release_response(response);
    }

    fn set_enable_release(&self, enabled: bool) {
        self.pools.release_enabled.store(enabled, Ordering::Release);
    }

    fn listen_and_serve(self: Arc<Self>, addr: String, handler: Arc<dyn Handler>) -> ServeFuture {
        Box::pin(self.bind_and_serve(addr, handler))
    }

    #[cfg(feature = "tls")]
    fn listen_and_serve_tls(
        self: Arc<Self>,
        addr: String,
        cert_file: PathBuf,
        key_file: PathBuf,
        handler: Arc<dyn Handler>,
    ) -> ServeFuture {
        Box::pin(self.bind_and_serve_tls(addr, cert_file, key_file, handler))
    }
}

static CURRENT: RwLock<Option<AnyProvider>> = RwLock::new(None);

/// Installs `provider` as the target of the free functions.
///
/// Replaces any provider registered before.
pub fn register_provider(provider: impl Into<AnyProvider>) {
    let provider = provider.into();
    tracing::info!(provider = provider.name(), "registered HTTP provider");
    *CURRENT.write().unwrap_or_else(PoisonError::into_inner) = Some(provider);
}

/// Returns the registered provider, registering [`HttpProvider::global`]
/// if there is none.
pub fn current_provider() -> AnyProvider {
    if let Some(provider) = CURRENT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return provider.clone();
    }
    CURRENT
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .get_or_insert_with(|| AnyProvider::new(Arc::clone(HttpProvider::global())))
        .clone()
}

/// Acquires a context from the current provider.
pub fn acquire_context() -> Box<dyn Context> {
    current_provider().acquire_context()
}

/// Acquires a request from the current provider.
pub fn acquire_request() -> Box<dyn Request> {
    current_provider().acquire_request()
}

/// Acquires a response from the current provider.
pub fn acquire_response() -> Box<dyn Response> {
    current_provider().acquire_response()
}

/// Releases a context to the current provider.
pub fn release_context(ctx: Box<dyn Context>) {
    current_provider().release_context(ctx);
}

/// Releases a request to the current provider.
pub fn release_request(request: Box<dyn Request>) {
    current_provider().release_request(request);
}

/// Releases a response to the current provider.
pub fn release_response(response: Box<dyn Response>) {
    current_provider().release_response(response);
}

/// Turns pooling of the current provider on or off.
pub fn set_enable_release(enabled: bool) {
    current_provider().set_enable_release(enabled);
}

/// Wraps a [`NativeHandler`] into a [`Handler`] for any provider.
///
/// Contexts bound to native objects are served directly, others through
/// [`convert`](crate::convert).
pub fn native_handler<H: NativeHandler>(handler: H) -> Native<H> {
    Native(handler)
}

/// Wraps a native closure into a [`Handler`] for any provider.
pub fn native_handler_func<F>(f: F) -> Native<NativeHandlerFunc<F>>
where
    F: Fn(&mut dyn ResponseWriter, &mut RawRequest) + Send + Sync + 'static,
{
    Native(NativeHandlerFunc::new(f))
}

/// Serves `handler` on `addr` with the current provider.
pub fn listen_and_serve(addr: impl Into<String>, handler: impl Handler) -> ServeFuture {
    current_provider().listen_and_serve(addr, handler)
}

/// Serves `handler` on `addr` over TLS with the current provider.
#[cfg(feature = "tls")]
pub fn listen_and_serve_tls(
    addr: impl Into<String>,
    cert_file: impl Into<PathBuf>,
    key_file: impl Into<PathBuf>,
    handler: impl Handler,
) -> ServeFuture {
    current_provider().listen_and_serve_tls(addr, cert_file, key_file, handler)
}
