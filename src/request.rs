//! Requests.
//!
//! This module provides three layers:
//!
//! - [`Request`], the abstract request handlers program against
//! - [`RawRequest`], the transport-native backing object produced by the
//!   server for every incoming request
//! - [`HttpRequest`], the pooled implementation of [`Request`] that wraps a
//!   [`RawRequest`] and can be rebound to a new one without reallocating
//!
//! # Examples
//!
//! ```rust
//! use http_provider::{HttpRequest, Method, RawRequest, Request, Values};
//!
//! let mut native = RawRequest::new(Method::POST, "/items?id=7".parse().unwrap());
//! native.header.add("X-Trace", "abc");
//!
//! let mut request = HttpRequest::new();
//! request.set_transport_request(native);
//! assert_eq!(request.method(), Method::POST);
//! assert_eq!(request.header().value("x-trace"), "abc");
//! assert_eq!(request.request_uri(), "/items?id=7");
//!
//! request.reset();
//! assert_eq!(request.method(), Method::GET);
//! assert!(request.url().is_none());
//! ```
use core::any::Any;
use core::mem;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::{Method, Uri, Version};

use crate::body::Body;
use crate::convert;
use crate::header::Header;
use crate::values::{FormValues, HeaderValues, Values};

/// Per-request deadline and cancellation state.
///
/// Clones share the cancellation flag. Nothing in this crate enforces the
/// deadline; it is carried for handlers and downstream calls.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl RequestContext {
    /// Creates a context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a child that shares the cancellation flag and expires at
    /// `deadline`.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// Returns a child that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Marks this context and every clone as cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once cancelled or past the deadline.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Negotiated state of a TLS connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsInfo {
    /// Protocol version, such as `TLSv1_3`.
    pub protocol_version: Option<String>,
    /// Negotiated cipher suite.
    pub cipher_suite: Option<String>,
    /// Protocol selected through ALPN.
    pub alpn_protocol: Option<Vec<u8>>,
    /// Server name sent by the client (SNI).
    pub server_name: Option<String>,
    /// DER-encoded client certificate chain.
    pub peer_certificates: Vec<Bytes>,
}

/// A parsed multipart form. This crate never parses one itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    /// Plain field values.
    pub value: HashMap<String, Vec<String>>,
    /// Uploaded files.
    pub file: HashMap<String, Vec<FileHeader>>,
}

/// Metadata of an uploaded file in a [`MultipartForm`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHeader {
    /// Client-supplied file name.
    pub filename: String,
    /// Part header.
    pub header: HeaderValues,
    /// Size in bytes.
    pub size: i64,
}

/// Connection metadata attached to an [`http::Request`] as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnInfo {
    /// Peer address.
    pub remote_addr: SocketAddr,
    /// TLS state, if the connection is encrypted.
    pub tls: Option<Arc<TlsInfo>>,
}

/// The transport-native request object.
///
/// The server builds one per incoming request. Every field is public; absent
/// values are the zero value of their type (`GET`, `None`, `""`, `0`).
#[derive(Debug, Default)]
pub struct RawRequest {
    /// Request method.
    pub method: Method,
    /// Request target. `None` on a pristine object.
    pub url: Option<Uri>,
    /// Protocol string, such as `HTTP/1.1`.
    pub proto: String,
    /// Protocol major version.
    pub proto_major: u8,
    /// Protocol minor version.
    pub proto_minor: u8,
    /// Header fields, without `Host` and `Transfer-Encoding`.
    pub header: HeaderValues,
    /// Request body.
    pub body: Option<Body>,
    /// Declared body length. `-1` means unknown.
    pub content_length: i64,
    /// Transfer codings, outermost last.
    pub transfer_encoding: Vec<String>,
    /// Whether the connection closes after this request.
    pub close: bool,
    /// Host the request is addressed to.
    pub host: String,
    /// Query and body form values, filled by [`RawRequest::parse_form`].
    pub form: FormValues,
    /// Body form values, filled by [`RawRequest::parse_form`].
    pub post_form: FormValues,
    /// Parsed multipart form.
    pub multipart_form: Option<Arc<MultipartForm>>,
    /// Trailer fields.
    pub trailer: HeaderValues,
    /// Peer address, as `ip:port`.
    pub remote_addr: String,
    /// Unmodified request target from the request line.
    pub request_uri: String,
    /// TLS state.
    pub tls: Option<Arc<TlsInfo>>,
    /// Request context.
    pub context: RequestContext,
}

impl RawRequest {
    /// Creates an HTTP/1.1 request for `url`.
    pub fn new(method: Method, url: Uri) -> Self {
        let host = url.authority().map(ToString::to_string).unwrap_or_default();
        Self {
            method,
            request_uri: url.to_string(),
            url: Some(url),
            proto: "HTTP/1.1".into(),
            proto_major: 1,
            proto_minor: 1,
            host,
            ..Self::default()
        }
    }

    /// Builds a request from its [`http`] form.
    ///
    /// `Host` and `Transfer-Encoding` move out of the header into
    /// [`RawRequest::host`] and [`RawRequest::transfer_encoding`]. A
    /// [`ConnInfo`] extension supplies the remote address and TLS state.
    pub fn from_http(request: http::Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        let mut header = HeaderValues::from(&parts.headers);

        let host = match parts.uri.authority() {
            Some(authority) => authority.to_string(),
            None => header.value("Host").to_owned(),
        };
        header.delete("Host");

        let transfer_encoding = convert::transfer_encodings(&header);
        header.delete("Transfer-Encoding");

        let proto = version_str(parts.version);
        let (proto_major, proto_minor) = parse_http_version(proto).unwrap_or((1, 1));
        let close = convert::wants_close(proto_major, proto_minor, &header);

        let content_length = match header.value("Content-Length").parse::<i64>() {
            Ok(length) if length >= 0 => length,
            _ if !transfer_encoding.is_empty() => -1,
            _ => body.len().map_or(-1, |len| len as i64),
        };

        let (remote_addr, tls) = match parts.extensions.get::<ConnInfo>() {
            Some(info) => (info.remote_addr.to_string(), info.tls.clone()),
            None => (String::new(), None),
        };

        Self {
            method: parts.method,
            request_uri: parts.uri.to_string(),
            url: Some(parts.uri),
            proto: proto.to_owned(),
            proto_major,
            proto_minor,
            header,
            body: Some(body),
            content_length,
            transfer_encoding,
            close,
            host,
            remote_addr,
            tls,
            ..Self::default()
        }
    }

    /// Converts back into an [`http::Request`].
    ///
    /// `Host` and `Transfer-Encoding` are written back to the header map. The
    /// remote address travels as a [`ConnInfo`] extension when it parses.
    pub fn into_http(self) -> http::Request<Body> {
        let mut headers = self.header.to_header_map();
        if !self.host.is_empty() && !headers.contains_key(http::header::HOST) {
            if let Ok(host) = http::HeaderValue::from_str(&self.host) {
                headers.insert(http::header::HOST, host);
            }
        }
        if !self.transfer_encoding.is_empty() {
            if let Ok(codings) = http::HeaderValue::from_str(&self.transfer_encoding.join(", ")) {
                headers.insert(http::header::TRANSFER_ENCODING, codings);
            }
        }

        let mut request = http::Request::new(self.body.unwrap_or_default());
        *request.method_mut() = self.method;
        *request.uri_mut() = self.url.unwrap_or_else(|| Uri::from_static("/"));
        *request.version_mut() = version_of(self.proto_major, self.proto_minor);
        *request.headers_mut() = headers;
        if let Ok(remote_addr) = self.remote_addr.parse() {
            request.extensions_mut().insert(ConnInfo {
                remote_addr,
                tls: self.tls,
            });
        }
        request
    }

    /// Returns every field to its zero value, keeping allocated capacity.
    pub fn clear(&mut self) {
        self.method = Method::GET;
        self.url = None;
        self.proto.clear();
        self.proto_major = 0;
        self.proto_minor = 0;
        self.header.reset();
        self.body = None;
        self.content_length = 0;
        self.transfer_encoding.clear();
        self.close = false;
        self.host.clear();
        self.form.reset();
        self.post_form.reset();
        self.multipart_form = None;
        self.trailer.reset();
        self.remote_addr.clear();
        self.request_uri.clear();
        self.tls = None;
        self.context = RequestContext::default();
    }

    /// Fills [`RawRequest::form`] and [`RawRequest::post_form`].
    ///
    /// For `POST`, `PUT` and `PATCH` requests with an
    /// `application/x-www-form-urlencoded` body, the body is consumed into
    /// `post_form`. `form` then receives the body values followed by the URL
    /// query values. Already parsed containers are left alone.
    #[cfg(feature = "form")]
    pub fn parse_form(&mut self) -> crate::Result<()> {
        if self.post_form.is_empty()
            && matches!(self.method, Method::POST | Method::PUT | Method::PATCH)
            && self.is_urlencoded()
        {
            if let Some(body) = self.body.as_mut().filter(|body| !body.is_closed()) {
                let bytes = body.take()?.into_bytes()?;
                let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&bytes)?;
                self.post_form.extend(pairs);
            }
        }

        if self.form.is_empty() {
            self.form.merge(&self.post_form);
            if let Some(query) = self.url.as_ref().and_then(Uri::query) {
                let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)?;
                self.form.extend(pairs);
            }
        }
        Ok(())
    }

    #[cfg(feature = "form")]
    fn is_urlencoded(&self) -> bool {
        self.header
            .value("Content-Type")
            .parse::<mime::Mime>()
            .is_ok_and(|mime| {
                mime.type_() == mime::APPLICATION && mime.subtype() == mime::WWW_FORM_URLENCODED
            })
    }
}

/// Parses an HTTP version string such as `HTTP/1.0`.
///
/// ```rust
/// use http_provider::request::parse_http_version;
///
/// assert_eq!(parse_http_version("HTTP/1.1"), Some((1, 1)));
/// assert_eq!(parse_http_version("HTTP/10.0"), None);
/// assert_eq!(parse_http_version("http/1.1"), None);
/// ```
pub fn parse_http_version(proto: &str) -> Option<(u8, u8)> {
    let (major, minor) = proto.strip_prefix("HTTP/")?.split_once('.')?;
    let digit = |s: &str| match s.as_bytes() {
        [d @ b'0'..=b'9'] => Some(d - b'0'),
        _ => None,
    };
    Some((digit(major)?, digit(minor)?))
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

fn version_of(major: u8, minor: u8) -> Version {
    match (major, minor) {
        (0, _) => Version::HTTP_09,
        (1, 0) => Version::HTTP_10,
        (2, _) => Version::HTTP_2,
        (3, _) => Version::HTTP_3,
        _ => Version::HTTP_11,
    }
}

/// An incoming request, independent of the transport behind it.
///
/// Container accessors return views on live storage: a value added through
/// [`Request::header_mut`] is visible through the next [`Request::header`].
///
/// Implementations are pooled. [`Request::reset`] must return the request to
/// the state of a freshly constructed one.
pub trait Request: Any + Send {
    /// Header fields.
    fn header(&self) -> &dyn Header;
    /// Mutable header fields.
    fn header_mut(&mut self) -> &mut dyn Header;
    /// Trailer fields.
    fn trailer(&self) -> &dyn Header;
    /// Mutable trailer fields.
    fn trailer_mut(&mut self) -> &mut dyn Header;

    /// Request method.
    fn method(&self) -> Method;
    /// Sets the request method.
    fn set_method(&mut self, method: Method);

    /// Request target, `None` before the request is bound.
    fn url(&self) -> Option<&Uri>;
    /// Sets the request target.
    fn set_url(&mut self, url: Option<Uri>);

    /// Protocol string, such as `HTTP/1.1`.
    fn proto(&self) -> &str;
    /// Protocol major version.
    fn proto_major(&self) -> u8;
    /// Protocol minor version.
    fn proto_minor(&self) -> u8;
    /// Sets the protocol string and, if it parses, both version numbers.
    fn set_proto(&mut self, proto: &str);

    /// Host the request is addressed to.
    fn host(&self) -> &str;
    /// Sets the host.
    fn set_host(&mut self, host: &str);

    /// Peer address.
    fn remote_addr(&self) -> &str;
    /// Sets the peer address.
    fn set_remote_addr(&mut self, addr: &str);

    /// Unmodified request target.
    fn request_uri(&self) -> &str;
    /// Sets the request target string.
    fn set_request_uri(&mut self, uri: &str);

    /// Declared body length, `-1` if unknown.
    fn content_length(&self) -> i64;
    /// Sets the declared body length.
    fn set_content_length(&mut self, length: i64);

    /// Transfer codings.
    fn transfer_encoding(&self) -> &[String];
    /// Sets the transfer codings.
    fn set_transfer_encoding(&mut self, codings: Vec<String>);

    /// Whether the connection closes after this request.
    fn close(&self) -> bool;
    /// Sets the close flag.
    fn set_close(&mut self, close: bool);

    /// Request body.
    fn body(&mut self) -> Option<&mut Body>;
    /// Moves the body out.
    fn take_body(&mut self) -> Option<Body>;
    /// Replaces the body.
    fn set_body(&mut self, body: Option<Body>);

    /// Query and body form values.
    fn form(&self) -> &dyn Values;
    /// Mutable form values.
    fn form_mut(&mut self) -> &mut dyn Values;
    /// Body form values.
    fn post_form(&self) -> &dyn Values;
    /// Mutable body form values.
    fn post_form_mut(&mut self) -> &mut dyn Values;

    /// Parsed multipart form.
    fn multipart_form(&self) -> Option<&Arc<MultipartForm>>;
    /// Sets the multipart form.
    fn set_multipart_form(&mut self, form: Option<Arc<MultipartForm>>);

    /// TLS state.
    fn tls(&self) -> Option<&Arc<TlsInfo>>;
    /// Sets the TLS state.
    fn set_tls(&mut self, tls: Option<Arc<TlsInfo>>);

    /// Request context.
    fn context(&self) -> &RequestContext;

    /// Replaces the request context.
    ///
    /// Every other field carries over; the request is rebound to a new
    /// backing object holding them. Returns the same logical request.
    fn with_context(&mut self, context: RequestContext) -> &mut dyn Request;

    /// Binds this request to the transport request `native`.
    ///
    /// The default copies every field of `native` except its context with
    /// [`convert::from_raw_request`]. [`HttpRequest`] installs `native` as
    /// its backing object instead.
    fn set_transport_request(&mut self, native: RawRequest) {
        convert::from_raw_request(native, self);
    }

    /// Returns the request to its freshly constructed state.
    fn reset(&mut self);

    /// Returns the transport-native backing object, if there is one.
    fn transport(&mut self) -> Option<&mut RawRequest> {
        None
    }
}

/// The pooled [`Request`] over a [`RawRequest`].
#[derive(Debug, Default)]
pub struct HttpRequest {
    active: RawRequest,
    original: Option<RawRequest>,
}

impl HttpRequest {
    /// Creates an unbound request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds this request to `native`.
    ///
    /// The request is reset first. The object it was backed by is kept and
    /// restored by the next [`Request::reset`].
    pub fn set_transport_request(&mut self, native: RawRequest) {
        self.reset();
        let previous = mem::replace(&mut self.active, native);
        self.original = Some(previous);
    }

    /// Returns `true` while bound to a transport request.
    pub fn is_bound(&self) -> bool {
        self.original.is_some()
    }

    /// The active backing object.
    pub fn transport_request(&self) -> &RawRequest {
        &self.active
    }

    /// The active backing object, mutably.
    pub fn transport_request_mut(&mut self) -> &mut RawRequest {
        &mut self.active
    }
}

impl Request for HttpRequest {
    fn header(&self) -> &dyn Header {
        &self.active.header
    }

    fn header_mut(&mut self) -> &mut dyn Header {
        &mut self.active.header
    }

    fn trailer(&self) -> &dyn Header {
        &self.active.trailer
    }

    fn trailer_mut(&mut self) -> &mut dyn Header {
        &mut self.active.trailer
    }

    fn method(&self) -> Method {
        self.active.method.clone()
    }

    fn set_method(&mut self, method: Method) {
        self.active.method = method;
    }

    fn url(&self) -> Option<&Uri> {
        self.active.url.as_ref()
    }

    fn set_url(&mut self, url: Option<Uri>) {
        self.active.url = url;
    }

    fn proto(&self) -> &str {
        &self.active.proto
    }

    fn proto_major(&self) -> u8 {
        self.active.proto_major
    }

    fn proto_minor(&self) -> u8 {
        self.active.proto_minor
    }

    fn set_proto(&mut self, proto: &str) {
        proto.clone_into(&mut self.active.proto);
        if let Some((major, minor)) = parse_http_version(proto) {
            self.active.proto_major = major;
            self.active.proto_minor = minor;
        }
    }

    fn host(&self) -> &str {
        &self.active.host
    }

    fn set_host(&mut self, host: &str) {
        host.clone_into(&mut self.active.host);
    }

    fn remote_addr(&self) -> &str {
        &self.active.remote_addr
    }

    fn set_remote_addr(&mut self, addr: &str) {
        addr.clone_into(&mut self.active.remote_addr);
    }

    fn request_uri(&self) -> &str {
        &self.active.request_uri
    }

    fn set_request_uri(&mut self, uri: &str) {
        uri.clone_into(&mut self.active.request_uri);
    }

    fn content_length(&self) -> i64 {
        self.active.content_length
    }

    fn set_content_length(&mut self, length: i64) {
        self.active.content_length = length;
    }

    fn transfer_encoding(&self) -> &[String] {
        &self.active.transfer_encoding
    }

    fn set_transfer_encoding(&mut self, codings: Vec<String>) {
        self.active.transfer_encoding = codings;
    }

    fn close(&self) -> bool {
        self.active.close
    }

    fn set_close(&mut self, close: bool) {
        self.active.close = close;
    }

    fn body(&mut self) -> Option<&mut Body> {
        self.active.body.as_mut()
    }

    fn take_body(&mut self) -> Option<Body> {
        self.active.body.take()
    }

    fn set_body(&mut self, body: Option<Body>) {
        self.active.body = body;
    }

    fn form(&self) -> &dyn Values {
        &self.active.form
    }

    fn form_mut(&mut self) -> &mut dyn Values {
        &mut self.active.form
    }

    fn post_form(&self) -> &dyn Values {
        &self.active.post_form
    }

    fn post_form_mut(&mut self) -> &mut dyn Values {
        &mut self.active.post_form
    }

    fn multipart_form(&self) -> Option<&Arc<MultipartForm>> {
        self.active.multipart_form.as_ref()
    }

    fn set_multipart_form(&mut self, form: Option<Arc<MultipartForm>>) {
        self.active.multipart_form = form;
    }

    fn tls(&self) -> Option<&Arc<TlsInfo>> {
        self.active.tls.as_ref()
    }

    fn set_tls(&mut self, tls: Option<Arc<TlsInfo>>) {
        self.active.tls = tls;
    }

    fn context(&self) -> &RequestContext {
        &self.active.context
    }

    fn with_context(&mut self, context: RequestContext) -> &mut dyn Request {
        let mut next = mem::take(&mut self.active);
        next.context = context;
        self.set_transport_request(next);
        self
    }

    fn set_transport_request(&mut self, native: RawRequest) {
        HttpRequest::set_transport_request(self, native);
    }

    fn reset(&mut self) {
        if let Some(original) = self.original.take() {
            self.active = original;
        }
        self.active.clear();
    }

    fn transport(&mut self) -> Option<&mut RawRequest> {
        Some(&mut self.active)
    }
}
