//! Responses.
//!
//! A handler answers through the abstract [`Response`]. The bundled
//! implementation, [`HttpResponse`], forwards to a bound [`ResponseBuffer`],
//! the transport-native sink that the server later turns into the wire
//! response.
//!
//! ```rust
//! use http_provider::{HttpResponse, Response, ResponseBuffer, StatusCode, Values};
//!
//! let mut response = HttpResponse::new();
//! response.set_transport_response_writer(ResponseBuffer::new());
//! response.header_mut().add("Content-Type", "text/plain");
//! response.write_header(StatusCode::CREATED);
//! response.write(b"done").unwrap();
//!
//! let buffer = response.take_transport_response_writer().unwrap();
//! let wire = buffer.into_http();
//! assert_eq!(wire.status(), StatusCode::CREATED);
//! assert_eq!(wire.headers()["content-type"], "text/plain");
//! ```
use core::any::Any;
use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use http::StatusCode;
use http_body_util::Full;

use crate::header::Header;
use crate::values::{HeaderValues, Values};

/// The transport-native response sink.
pub trait ResponseWriter: Send {
    /// Header fields sent with the status line.
    fn header_mut(&mut self) -> &mut dyn Header;

    /// Appends body bytes, implying `200 OK` if no status was written.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// Sends the status line.
    fn write_header(&mut self, status: StatusCode);
}

/// A [`ResponseWriter`] that buffers the whole response in memory.
///
/// The first status written wins; later calls are ignored.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    status: Option<StatusCode>,
    header: HeaderValues,
    body: BytesMut,
}

impl ResponseBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The status that will be sent. `200 OK` until one is written.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Returns `true` once a status has been written.
    pub fn is_committed(&self) -> bool {
        self.status.is_some()
    }

    /// Header fields.
    pub fn header(&self) -> &HeaderValues {
        &self.header
    }

    /// Body written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Builds the wire response.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.header.to_header_map();
        response
    }
}

impl ResponseWriter for ResponseBuffer {
    fn header_mut(&mut self) -> &mut dyn Header {
        &mut self.header
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.status.get_or_insert(StatusCode::OK);
        self.body.put_slice(bytes);
        Ok(bytes.len())
    }

    fn write_header(&mut self, status: StatusCode) {
        match self.status {
            Some(sent) => tracing::debug!(
                sent = sent.as_u16(),
                ignored = status.as_u16(),
                "superfluous write_header call"
            ),
            None => self.status = Some(status),
        }
    }
}

impl io::Write for ResponseBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ResponseWriter::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An outgoing response, independent of the transport behind it.
///
/// Implementations are pooled. [`Response::reset`] must return the response
/// to the state of a freshly constructed one.
pub trait Response: Any + Send {
    /// Header fields.
    fn header(&self) -> &dyn Header;

    /// Mutable header fields.
    fn header_mut(&mut self) -> &mut dyn Header;

    /// Appends body bytes. Reports `Ok(0)` when nothing is bound.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// Sends the status line. Does nothing when nothing is bound.
    fn write_header(&mut self, status: StatusCode);

    /// Binds this response to the transport sink `writer`.
    fn set_transport_response_writer(&mut self, writer: ResponseBuffer);

    /// Returns the response to its freshly constructed state.
    fn reset(&mut self);

    /// Returns the transport-native sink, if one is bound.
    fn transport(&mut self) -> Option<&mut ResponseBuffer> {
        None
    }
}

/// The pooled [`Response`] over a [`ResponseBuffer`].
#[derive(Debug, Default)]
pub struct HttpResponse {
    writer: Option<ResponseBuffer>,
    header: HeaderValues,
}

impl HttpResponse {
    /// Creates an unbound response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds this response to `writer`.
    pub fn set_transport_response_writer(&mut self, writer: ResponseBuffer) {
        self.writer = Some(writer);
    }

    /// Unbinds and returns the sink.
    pub fn take_transport_response_writer(&mut self) -> Option<ResponseBuffer> {
        self.writer.take()
    }

    /// Returns `true` while a sink is bound.
    pub fn is_bound(&self) -> bool {
        self.writer.is_some()
    }
}

impl Response for HttpResponse {
    fn header(&self) -> &dyn Header {
        match &self.writer {
            Some(writer) => &writer.header,
            None => &self.header,
        }
    }

    fn header_mut(&mut self) -> &mut dyn Header {
        match &mut self.writer {
            Some(writer) => &mut writer.header,
            None => &mut self.header,
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        match &mut self.writer {
            Some(writer) => ResponseWriter::write(writer, bytes),
            None => Ok(0),
        }
    }

    fn write_header(&mut self, status: StatusCode) {
        if let Some(writer) = &mut self.writer {
            writer.write_header(status);
        }
    }

    fn set_transport_response_writer(&mut self, writer: ResponseBuffer) {
        HttpResponse::set_transport_response_writer(self, writer);
    }

    fn reset(&mut self) {
        self.header.reset();
        self.writer = None;
    }

    fn transport(&mut self) -> Option<&mut ResponseBuffer> {
        self.writer.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn unbound_response_is_inert() {
        let mut response = HttpResponse::new();
        assert_eq!(response.write(b"lost").unwrap(), 0);
        response.write_header(StatusCode::NOT_FOUND);
        response.header_mut().add("X-Local", "1");
        assert_eq!(response.header().value("x-local"), "1");
        assert!(response.transport().is_none());
    }

    #[test]
    fn rebinds_through_trait_object() {
        let mut response = HttpResponse::new();
        let erased: &mut dyn Response = &mut response;
        erased.set_transport_response_writer(ResponseBuffer::new());
        erased.write_header(StatusCode::CREATED);
        assert_eq!(erased.write(b"ok").unwrap(), 2);
        assert!(erased.transport().is_some());

        let buffer = response.take_transport_response_writer().unwrap();
        assert_eq!(buffer.status(), StatusCode::CREATED);
        assert_eq!(buffer.body(), b"ok");
    }

    #[test]
    fn bound_response_forwards_to_sink() {
        let mut response = HttpResponse::new();
        response.header_mut().add("X-Local", "1");
        response.set_transport_response_writer(ResponseBuffer::new());
        assert!(!response.header().has("X-Local"));

        response.header_mut().add("X-Sink", "2");
        assert_eq!(response.write(b"abc").unwrap(), 3);

        let buffer = response.take_transport_response_writer().unwrap();
        assert_eq!(buffer.header().value("X-Sink"), "2");
        assert_eq!(buffer.body(), b"abc");
        assert_eq!(buffer.status(), StatusCode::OK);
    }

    #[test]
    fn first_status_wins() {
        let mut buffer = ResponseBuffer::new();
        assert!(!buffer.is_committed());
        buffer.write_header(StatusCode::ACCEPTED);
        buffer.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(buffer.status(), StatusCode::ACCEPTED);

        let mut implicit = ResponseBuffer::new();
        ResponseWriter::write(&mut implicit, b"x").unwrap();
        implicit.write_header(StatusCode::NOT_FOUND);
        assert_eq!(implicit.status(), StatusCode::OK);
    }

    #[test]
    fn reset_clears_header_and_unbinds() {
        let mut response = HttpResponse::new();
        response.header_mut().add("X-Local", "1");
        response.set_transport_response_writer(ResponseBuffer::new());
        response.reset();
        assert!(!response.is_bound());
        assert!(response.header().is_empty());
    }

    #[tokio::test]
    async fn buffer_becomes_wire_response() {
        let mut buffer = ResponseBuffer::new();
        std::io::Write::write_all(&mut buffer, b"hello ").unwrap();
        std::io::Write::write_all(&mut buffer, b"world").unwrap();
        buffer.header_mut().add("X-Multi", "a");
        buffer.header_mut().add("X-Multi", "b");

        let response = buffer.into_http();
        assert_eq!(response.status(), StatusCode::OK);
        let values: Vec<_> = response.headers().get_all("x-multi").iter().collect();
        assert_eq!(values, ["a", "b"]);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"hello world");
    }
}
