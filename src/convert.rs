//! Conversions between abstract and transport-native objects.
//!
//! These functions let a [`NativeHandler`](crate::NativeHandler) run on any
//! [`Context`](crate::Context), and let a foreign provider bind a
//! [`RawRequest`] to its own [`Request`] type.
//!
//! ```rust
//! use http_provider::{convert, HeaderValues, Values};
//!
//! let mut header = HeaderValues::new();
//! header.add("Transfer-Encoding", "gzip, chunked");
//! assert_eq!(convert::transfer_encodings(&header), ["gzip", "chunked"]);
//! ```
use core::fmt;
use std::io;

use http::StatusCode;

use crate::header::Header;
use crate::request::{RawRequest, Request};
use crate::response::{Response, ResponseWriter};
use crate::values::{FormValues, HeaderValues, Values};

/// Copies any header into a [`HeaderValues`], preserving value order.
pub fn to_header(header: &dyn Header) -> HeaderValues {
    let mut out = HeaderValues::with_capacity(header.len());
    header.each(&mut |name, values| out.set(name, values.to_vec()));
    out
}

/// Copies any value container into a [`FormValues`], preserving value order.
pub fn to_form(values: &dyn Values) -> FormValues {
    let mut out = FormValues::with_capacity(values.len());
    values.each(&mut |name, values| out.set(name, values.to_vec()));
    out
}

fn copy_values<T: Values + ?Sized>(from: &dyn Values, to: &mut T) {
    to.reset();
    from.each(&mut |name, values| to.set(name, values.to_vec()));
}

/// Splits every `Transfer-Encoding` value into its codings.
///
/// Tokens are trimmed and empty tokens dropped, so `"chunked, gzip"` and
/// `"chunked,,gzip"` both yield `["chunked", "gzip"]`.
pub fn transfer_encodings(header: &dyn Header) -> Vec<String> {
    header
        .values("Transfer-Encoding")
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|coding| !coding.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Returns `true` if the connection should close after this request.
///
/// That is the case when `Connection` lists `close`, and for HTTP/1.0 and
/// earlier unless `Connection` lists `keep-alive`.
pub fn wants_close(major: u8, minor: u8, header: &dyn Header) -> bool {
    let lists = |token: &str| {
        header
            .values("Connection")
            .iter()
            .flat_map(|value| value.split(','))
            .any(|option| option.trim().eq_ignore_ascii_case(token))
    };
    if lists("close") {
        return true;
    }
    (major, minor) < (1, 1) && !lists("keep-alive")
}

/// Copies `request` into a new [`RawRequest`].
///
/// The body moves into the copy. TLS state and the multipart form are shared.
pub fn to_raw_request(request: &mut dyn Request) -> RawRequest {
    let header = to_header(request.header());
    let transfer_encoding = match request.transfer_encoding() {
        [] => transfer_encodings(&header),
        codings => codings.to_vec(),
    };
    let close = request.close()
        || (!request.proto().is_empty()
            && wants_close(request.proto_major(), request.proto_minor(), &header));

    RawRequest {
        method: request.method(),
        url: request.url().cloned(),
        proto: request.proto().to_owned(),
        proto_major: request.proto_major(),
        proto_minor: request.proto_minor(),
        header,
        body: request.take_body(),
        content_length: request.content_length(),
        transfer_encoding,
        close,
        host: request.host().to_owned(),
        form: to_form(request.form()),
        post_form: to_form(request.post_form()),
        multipart_form: request.multipart_form().cloned(),
        trailer: to_header(request.trailer()),
        remote_addr: request.remote_addr().to_owned(),
        request_uri: request.request_uri().to_owned(),
        tls: request.tls().cloned(),
        context: request.context().clone(),
    }
}

/// Writes every field of `raw` into `request`.
///
/// The request's context is left alone; use [`Request::with_context`] to
/// carry `raw.context` over.
pub fn from_raw_request<R: Request + ?Sized>(raw: RawRequest, request: &mut R) {
    request.set_method(raw.method);
    request.set_url(raw.url);
    request.set_proto(&raw.proto);
    copy_values(&raw.header, request.header_mut());
    request.set_body(raw.body);
    request.set_content_length(raw.content_length);
    request.set_transfer_encoding(raw.transfer_encoding);
    request.set_close(raw.close);
    request.set_host(&raw.host);
    copy_values(&raw.form, request.form_mut());
    copy_values(&raw.post_form, request.post_form_mut());
    request.set_multipart_form(raw.multipart_form);
    copy_values(&raw.trailer, request.trailer_mut());
    request.set_remote_addr(&raw.remote_addr);
    request.set_request_uri(&raw.request_uri);
    request.set_tls(raw.tls);
}

/// Exposes any [`Response`] as a [`ResponseWriter`].
pub fn to_response_writer(response: &mut dyn Response) -> ResponseWriterAdapter<'_> {
    ResponseWriterAdapter { response }
}

/// Returned by [`to_response_writer`].
pub struct ResponseWriterAdapter<'a> {
    response: &'a mut dyn Response,
}

impl fmt::Debug for ResponseWriterAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriterAdapter").finish_non_exhaustive()
    }
}

impl ResponseWriter for ResponseWriterAdapter<'_> {
    fn header_mut(&mut self) -> &mut dyn Header {
        self.response.header_mut()
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.response.write(bytes)
    }

    fn write_header(&mut self, status: StatusCode) {
        self.response.write_header(status);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::request::{HttpRequest, MultipartForm, RequestContext, TlsInfo};
    use crate::response::{HttpResponse, ResponseBuffer};
    use crate::{Body, Method};

    #[test]
    fn splits_transfer_codings() {
        let mut header = HeaderValues::new();
        header.add("Transfer-Encoding", "chunked, gzip");
        assert_eq!(transfer_encodings(&header), ["chunked", "gzip"]);

        header.add("transfer-encoding", " , br,");
        assert_eq!(transfer_encodings(&header), ["chunked", "gzip", "br"]);

        assert!(transfer_encodings(&HeaderValues::new()).is_empty());
    }

    #[test]
    fn close_follows_connection_and_version() {
        let empty = HeaderValues::new();
        assert!(!wants_close(1, 1, &empty));
        assert!(wants_close(1, 0, &empty));
        assert!(wants_close(0, 9, &empty));

        let mut close = HeaderValues::new();
        close.add("Connection", "Upgrade, Close");
        assert!(wants_close(1, 1, &close));

        let mut keep = HeaderValues::new();
        keep.add("connection", "keep-alive");
        assert!(!wants_close(1, 0, &keep));
    }

    #[test]
    fn copies_preserve_value_order() {
        let mut header = HeaderValues::new();
        header.add("Accept", "a");
        header.add("Accept", "b");
        assert_eq!(to_header(&header).values("accept"), ["a", "b"]);

        let mut form = FormValues::new();
        form.set("empty", Vec::new());
        let copy = to_form(&form);
        assert!(copy.has("empty"));
        assert!(copy.values("empty").is_empty());
    }

    #[test]
    fn raw_request_round_trip() {
        let mut source = HttpRequest::new();
        let tls = Arc::new(TlsInfo {
            server_name: Some("example.com".into()),
            ..TlsInfo::default()
        });
        let mut native = RawRequest::new(Method::POST, "http://example.com/r?x=1".parse().unwrap());
        native.header.add("Transfer-Encoding", "chunked");
        native.header.add("X-A", "1");
        native.trailer.add("X-Sum", "9");
        native.form.add("x", "1");
        native.body = Some(Body::from("payload"));
        native.remote_addr = "192.0.2.1:80".into();
        native.tls = Some(Arc::clone(&tls));
        native.context = RequestContext::new();
        source.set_transport_request(native);

        let raw = to_raw_request(&mut source);
        assert!(source.body().is_none());
        assert_eq!(raw.method, Method::POST);
        assert_eq!(raw.host, "example.com");
        assert_eq!(raw.transfer_encoding, ["chunked"]);
        assert!(!raw.close);
        assert_eq!(raw.trailer.value("x-sum"), "9");
        assert!(Arc::ptr_eq(raw.tls.as_ref().unwrap(), &tls));

        let mut target = HttpRequest::new();
        target.header_mut().add("X-Stale", "1");
        from_raw_request(raw, &mut target);
        assert!(!target.header().has("X-Stale"));
        assert_eq!(target.header().value("X-A"), "1");
        assert_eq!(target.request_uri(), "http://example.com/r?x=1");
        assert_eq!(target.proto(), "HTTP/1.1");
        assert_eq!(target.form().value("x"), "1");
        assert_eq!(target.remote_addr(), "192.0.2.1:80");
        assert!(target.tls().is_some());
        let body = target.take_body().unwrap();
        assert_eq!(body.into_bytes().unwrap().as_ref(), b"payload");
    }

    /// Keeps its own fields instead of swapping in a backing object.
    #[derive(Debug, Default)]
    struct Copied(HttpRequest);

    impl Request for Copied {
        fn header(&self) -> &dyn Header {
            self.0.header()
        }

        fn header_mut(&mut self) -> &mut dyn Header {
            self.0.header_mut()
        }

        fn trailer(&self) -> &dyn Header {
            self.0.trailer()
        }

        fn trailer_mut(&mut self) -> &mut dyn Header {
            self.0.trailer_mut()
        }

        fn method(&self) -> Method {
            self.0.method()
        }

        fn set_method(&mut self, method: Method) {
            self.0.set_method(method)
        }

        fn url(&self) -> Option<&http::Uri> {
            self.0.url()
        }

        fn set_url(&mut self, url: Option<http::Uri>) {
            self.0.set_url(url)
        }

        fn proto(&self) -> &str {
            self.0.proto()
        }

        fn proto_major(&self) -> u8 {
            self.0.proto_major()
        }

        fn proto_minor(&self) -> u8 {
            self.0.proto_minor()
        }

        fn set_proto(&mut self, proto: &str) {
            self.0.set_proto(proto)
        }

        fn host(&self) -> &str {
            self.0.host()
        }

        fn set_host(&mut self, host: &str) {
            self.0.set_host(host)
        }

        fn remote_addr(&self) -> &str {
            self.0.remote_addr()
        }

        fn set_remote_addr(&mut self, addr: &str) {
            self.0.set_remote_addr(addr)
        }

        fn request_uri(&self) -> &str {
            self.0.request_uri()
        }

        fn set_request_uri(&mut self, uri: &str) {
            self.0.set_request_uri(uri)
        }

        fn content_length(&self) -> i64 {
            self.0.content_length()
        }

        fn set_content_length(&mut self, length: i64) {
            self.0.set_content_length(length)
        }

        fn transfer_encoding(&self) -> &[String] {
            self.0.transfer_encoding()
        }

        fn set_transfer_encoding(&mut self, codings: Vec<String>) {
            self.0.set_transfer_encoding(codings)
        }

        fn close(&self) -> bool {
            self.0.close()
        }

        fn set_close(&mut self, close: bool) {
            self.0.set_close(close)
        }

        fn body(&mut self) -> Option<&mut Body> {
            self.0.body()
        }

        fn take_body(&mut self) -> Option<Body> {
            self.0.take_body()
        }

        fn set_body(&mut self, body: Option<Body>) {
            self.0.set_body(body)
        }

        fn form(&self) -> &dyn Values {
            self.0.form()
        }

        fn form_mut(&mut self) -> &mut dyn Values {
            self.0.form_mut()
        }

        fn post_form(&self) -> &dyn Values {
            self.0.post_form()
        }

        fn post_form_mut(&mut self) -> &mut dyn Values {
            self.0.post_form_mut()
        }

        fn multipart_form(&self) -> Option<&Arc<MultipartForm>> {
            self.0.multipart_form()
        }

        fn set_multipart_form(&mut self, form: Option<Arc<MultipartForm>>) {
            self.0.set_multipart_form(form)
        }

        fn tls(&self) -> Option<&Arc<TlsInfo>> {
            self.0.tls()
        }

        fn set_tls(&mut self, tls: Option<Arc<TlsInfo>>) {
            self.0.set_tls(tls)
        }

        fn context(&self) -> &RequestContext {
            self.0.context()
        }

        fn with_context(&mut self, context: RequestContext) -> &mut dyn Request {
            self.0.with_context(context)
        }

        fn reset(&mut self) {
            self.0.reset()
        }
    }

    #[test]
    fn default_rebind_copies_fields() {
        let mut request = Copied::default();
        request.header_mut().add("X-Stale", "1");
        let mut native = RawRequest::new(Method::PUT, "http://example.com/put".parse().unwrap());
        native.header.add("X-New", "2");
        native.body = Some(Body::from("copied"));

        let erased: &mut dyn Request = &mut request;
        erased.set_transport_request(native);
        assert_eq!(erased.method(), Method::PUT);
        assert_eq!(erased.host(), "example.com");
        assert!(!erased.header().has("X-Stale"));
        assert_eq!(erased.header().value("X-New"), "2");
        let body = erased.take_body().unwrap();
        assert_eq!(body.into_bytes().unwrap().as_ref(), b"copied");
        assert!(!request.0.is_bound());
    }

    #[test]
    fn adapter_routes_straight_through() {
        let mut response = HttpResponse::new();
        response.set_transport_response_writer(ResponseBuffer::new());
        {
            let mut writer = to_response_writer(&mut response);
            writer.header_mut().add("X-Via", "adapter");
            writer.write_header(StatusCode::NO_CONTENT);
            assert_eq!(writer.write(b"").unwrap(), 0);
        }
        let buffer = response.take_transport_response_writer().unwrap();
        assert_eq!(buffer.status(), StatusCode::NO_CONTENT);
        assert_eq!(buffer.header().value("X-Via"), "adapter");
    }
}
