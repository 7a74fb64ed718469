//! Per-request contexts.
//!
//! A [`Context`] pairs one [`Request`] with one [`Response`] for the duration
//! of a handler call. [`HttpContext`] is the pooled implementation used by
//! [`HttpProvider`](crate::HttpProvider): its request and response come from
//! the same provider's pools and go back there on [`Context::reset`].
use core::any::Any;
use std::sync::{Arc, Weak};

use crate::provider::Pools;
use crate::request::{HttpRequest, RawRequest, Request};
use crate::response::{HttpResponse, ResponseBuffer, Response};

/// The request/response pair a handler operates on.
pub trait Context: Any + Send {
    /// The request, acquired on first use.
    fn request(&mut self) -> &mut dyn Request;

    /// The response, acquired on first use.
    fn response(&mut self) -> &mut dyn Response;

    /// Releases the request and response and leaves both slots empty.
    fn reset(&mut self);

    /// Reports which objects back this context.
    ///
    /// Handlers that speak the transport's native types use this to skip
    /// conversion. The default reports [`Backend::Foreign`].
    fn backend(&mut self) -> Backend<'_> {
        Backend::Foreign
    }
}

/// Result of [`Context::backend`].
#[derive(Debug)]
pub enum Backend<'a> {
    /// The context is bound to transport-native objects.
    Native {
        /// The native request.
        request: &'a mut RawRequest,
        /// The native response sink.
        writer: &'a mut ResponseBuffer,
    },
    /// The context is backed by something else.
    Foreign,
}

/// The pooled [`Context`] of [`HttpProvider`](crate::HttpProvider).
///
/// A context only refers weakly to its pools. Once the provider is gone,
/// children are built fresh and dropped on release.
#[derive(Debug)]
pub struct HttpContext {
    pools: Weak<Pools>,
    request: Option<Box<HttpRequest>>,
    response: Option<Box<HttpResponse>>,
}

impl HttpContext {
    pub(crate) fn new(pools: &Arc<Pools>) -> Self {
        Self {
            pools: Arc::downgrade(pools),
            request: Some(pools.acquire_request()),
            response: Some(pools.acquire_response()),
        }
    }

    /// Creates a context that belongs to no provider.
    pub fn detached() -> Self {
        Self {
            pools: Weak::new(),
            request: Some(Box::default()),
            response: Some(Box::default()),
        }
    }

    /// The request as its concrete type.
    pub fn http_request(&mut self) -> &mut HttpRequest {
        let pools = &self.pools;
        self.request.get_or_insert_with(|| match pools.upgrade() {
            Some(pools) => pools.acquire_request(),
            None => Box::default(),
        })
    }

    /// The response as its concrete type.
    pub fn http_response(&mut self) -> &mut HttpResponse {
        let pools = &self.pools;
        self.response.get_or_insert_with(|| match pools.upgrade() {
            Some(pools) => pools.acquire_response(),
            None => Box::default(),
        })
    }

    /// Returns `true` while a request is held.
    pub fn has_request(&self) -> bool {
        self.request.is_some()
    }

    /// Returns `true` while a response is held.
    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }
}

impl Context for HttpContext {
    fn request(&mut self) -> &mut dyn Request {
        self.http_request()
    }

    fn response(&mut self) -> &mut dyn Response {
        self.http_response()
    }

    fn reset(&mut self) {
        let pools = self.pools.upgrade();
        if let Some(request) = self.request.take() {
            if let Some(pools) = &pools {
                pools.release_request(request);
            }
        }
        if let Some(response) = self.response.take() {
            if let Some(pools) = &pools {
                pools.release_response(response);
            }
        }
    }

    fn backend(&mut self) -> Backend<'_> {
        self.http_request();
        self.http_response();
        match (self.request.as_deref_mut(), self.response.as_deref_mut()) {
            (Some(request), Some(response)) => match response.transport() {
                Some(writer) => Backend::Native {
                    request: request.transport_request_mut(),
                    writer,
                },
                None => Backend::Foreign,
            },
            _ => Backend::Foreign,
        }
    }
}
