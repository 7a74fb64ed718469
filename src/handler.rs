//! Request handlers.
//!
//! [`Handler`] is the provider-neutral entry point, called once per request
//! with a [`Context`]. [`NativeHandler`] is written against the transport's
//! own types; wrap one in [`Native`] to use it anywhere a [`Handler`] is
//! expected.
//!
//! # Examples
//!
//! ```rust
//! use http_provider::{Context, Handler, HandlerFunc, HttpContext, StatusCode};
//!
//! let hello = HandlerFunc::new(|ctx: &mut dyn Context| {
//!     ctx.response().write_header(StatusCode::OK);
//!     let _ = ctx.response().write(b"hello");
//! });
//!
//! let mut ctx = HttpContext::detached();
//! hello.handle(&mut ctx);
//! ```
use core::fmt;
use std::sync::Arc;

use crate::context::{Backend, Context};
use crate::convert;
use crate::request::RawRequest;
use crate::response::ResponseWriter;

/// Serves requests through the abstract [`Context`].
pub trait Handler: Send + Sync + 'static {
    /// Handles one request.
    fn handle(&self, ctx: &mut dyn Context);
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn handle(&self, ctx: &mut dyn Context) {
        (**self).handle(ctx);
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn handle(&self, ctx: &mut dyn Context) {
        (**self).handle(ctx);
    }
}

/// A [`Handler`] backed by a closure.
pub struct HandlerFunc<F>(F);

impl<F> HandlerFunc<F>
where
    F: Fn(&mut dyn Context) + Send + Sync + 'static,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Handler for HandlerFunc<F>
where
    F: Fn(&mut dyn Context) + Send + Sync + 'static,
{
    fn handle(&self, ctx: &mut dyn Context) {
        (self.0)(ctx);
    }
}

impl<F> fmt::Debug for HandlerFunc<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerFunc")
            .field(&core::any::type_name::<F>())
            .finish()
    }
}

/// Serves requests through the transport's native types.
pub trait NativeHandler: Send + Sync + 'static {
    /// Handles one request.
    fn serve(&self, writer: &mut dyn ResponseWriter, request: &mut RawRequest);
}

/// A [`NativeHandler`] backed by a closure.
pub struct NativeHandlerFunc<F>(F);

impl<F> NativeHandlerFunc<F>
where
    F: Fn(&mut dyn ResponseWriter, &mut RawRequest) + Send + Sync + 'static,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> NativeHandler for NativeHandlerFunc<F>
where
    F: Fn(&mut dyn ResponseWriter, &mut RawRequest) + Send + Sync + 'static,
{
    fn serve(&self, writer: &mut dyn ResponseWriter, request: &mut RawRequest) {
        (self.0)(writer, request);
    }
}

impl<F> fmt::Debug for NativeHandlerFunc<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NativeHandlerFunc")
            .field(&core::any::type_name::<F>())
            .finish()
    }
}

/// Adapts a [`NativeHandler`] into a [`Handler`].
///
/// Contexts reporting [`Backend::Native`] are served straight from their
/// bound objects. Any other context is copied into a [`RawRequest`], served,
/// and its body handed back.
#[derive(Debug, Clone)]
pub struct Native<H>(pub H);

impl<H: NativeHandler> Handler for Native<H> {
    fn handle(&self, ctx: &mut dyn Context) {
        if let Backend::Native { request, writer } = ctx.backend() {
            self.0.serve(writer, request);
            return;
        }

        let mut raw = convert::to_raw_request(ctx.request());
        let mut writer = convert::to_response_writer(ctx.response());
        self.0.serve(&mut writer, &mut raw);
        drop(writer);
        ctx.request().set_body(raw.body.take());
    }
}
