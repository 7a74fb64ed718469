//! Request body streams.
//!
//! [`Body`] is the readable, closable byte stream carried by a request. It
//! either holds bytes already received by the transport or wraps a blocking
//! [`std::io::Read`] source. Reading implements [`std::io::Read`]; the
//! transport side sees it as an [`http_body::Body`].
//!
//! ```rust
//! use std::io::Read;
//! use http_provider::Body;
//!
//! let mut body = Body::from("hello");
//! let mut text = String::new();
//! body.read_to_string(&mut text).unwrap();
//! assert_eq!(text, "hello");
//!
//! body.close();
//! assert!(body.is_closed());
//! ```
use core::fmt;
use core::mem;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::borrow::Cow;
use std::io::{self, Read};

use bytes::{Buf, Bytes};
use bytestr::ByteStr;

use crate::error::{Error, Result};

type BoxReader = Box<dyn Read + Send + 'static>;

const READ_CHUNK: usize = 8 * 1024;

/// A readable, closable request body.
pub struct Body {
    inner: BodyInner,
}

enum BodyInner {
    Once(Bytes),
    Reader {
        reader: BoxReader,
        length: Option<usize>,
    },
    Closed,
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            BodyInner::Once(bytes) => f.debug_tuple("Body").field(&bytes.len()).finish(),
            BodyInner::Reader { length, .. } => f
                .debug_struct("Body")
                .field("reader", &true)
                .field("length", length)
                .finish(),
            BodyInner::Closed => f.write_str("Body(closed)"),
        }
    }
}

impl Body {
    /// Creates an empty body.
    pub const fn empty() -> Self {
        Self {
            inner: BodyInner::Once(Bytes::new()),
        }
    }

    /// Creates a body holding `data`.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            inner: BodyInner::Once(data.into()),
        }
    }

    /// Creates a body that reads from `reader`.
    ///
    /// `length` is a hint of the number of bytes the reader will produce.
    pub fn from_reader(reader: impl Read + Send + 'static, length: Option<usize>) -> Self {
        Self {
            inner: BodyInner::Reader {
                reader: Box::new(reader),
                length,
            },
        }
    }

    /// Returns the remaining length if it is known.
    pub fn len(&self) -> Option<usize> {
        match &self.inner {
            BodyInner::Once(bytes) => Some(bytes.len()),
            BodyInner::Reader { length, .. } => *length,
            BodyInner::Closed => None,
        }
    }

    /// Returns `Some(true)` if the body is known to be empty.
    pub fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }

    /// Closes the body, dropping any unread data.
    pub fn close(&mut self) {
        self.inner = BodyInner::Closed;
    }

    /// Returns `true` once the body has been closed or taken.
    pub const fn is_closed(&self) -> bool {
        matches!(self.inner, BodyInner::Closed)
    }

    /// Moves the content out, leaving a closed body in its place.
    pub fn take(&mut self) -> Result<Self> {
        if self.is_closed() {
            return Err(Error::BodyClosed);
        }
        Ok(Self {
            inner: mem::replace(&mut self.inner, BodyInner::Closed),
        })
    }

    /// Reads the whole body into memory.
    pub fn into_bytes(self) -> Result<Bytes> {
        match self.inner {
            BodyInner::Once(bytes) => Ok(bytes),
            BodyInner::Reader { mut reader, length } => {
                let mut buf = Vec::with_capacity(length.unwrap_or(0));
                reader.read_to_end(&mut buf)?;
                Ok(buf.into())
            }
            BodyInner::Closed => Err(Error::BodyClosed),
        }
    }

    /// Reads the whole body as UTF-8 text.
    pub fn into_string(self) -> Result<ByteStr> {
        Ok(ByteStr::from_utf8(self.into_bytes()?)?)
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            BodyInner::Once(bytes) => {
                let n = buf.len().min(bytes.len());
                bytes.copy_to_slice(&mut buf[..n]);
                Ok(n)
            }
            BodyInner::Reader { reader, length } => {
                let n = reader.read(buf)?;
                if let Some(known) = length {
                    *known = known.saturating_sub(n);
                }
                Ok(n)
            }
            BodyInner::Closed => Err(io::Error::other(Error::BodyClosed)),
        }
    }
}

impl http_body::Body for Body {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match &mut this.inner {
            BodyInner::Once(bytes) if bytes.is_empty() => Poll::Ready(None),
            BodyInner::Once(bytes) => {
                Poll::Ready(Some(Ok(http_body::Frame::data(mem::take(bytes)))))
            }
            // Reader bodies are drained synchronously, one chunk per frame.
            BodyInner::Reader { reader, length } => {
                let mut chunk = vec![0; READ_CHUNK];
                match reader.read(&mut chunk) {
                    Ok(0) => Poll::Ready(None),
                    Ok(n) => {
                        if let Some(known) = length {
                            *known = known.saturating_sub(n);
                        }
                        chunk.truncate(n);
                        Poll::Ready(Some(Ok(http_body::Frame::data(chunk.into()))))
                    }
                    Err(error) => Poll::Ready(Some(Err(error.into()))),
                }
            }
            BodyInner::Closed => Poll::Ready(Some(Err(Error::BodyClosed))),
        }
    }

    fn is_end_stream(&self) -> bool {
        matches!(&self.inner, BodyInner::Once(bytes) if bytes.is_empty())
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self.len() {
            Some(len) => http_body::SizeHint::with_exact(len as u64),
            None => http_body::SizeHint::default(),
        }
    }
}

macro_rules! from_bytes {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Body {
                fn from(data: $ty) -> Self {
                    Body::from_bytes(data)
                }
            }
        )*
    };
}
from_bytes!(Bytes, Vec<u8>, Box<[u8]>, ByteStr, String, &'static [u8], &'static str);

impl<'a> From<Cow<'a, str>> for Body {
    fn from(data: Cow<'a, str>) -> Self {
        Body::from_bytes(data.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn reads_in_memory_bytes() {
        let mut body = Body::from("hello world");
        assert_eq!(body.len(), Some(11));

        let mut first = [0; 5];
        assert_eq!(body.read(&mut first).unwrap(), 5);
        assert_eq!(&first, b"hello");
        assert_eq!(body.len(), Some(6));

        let rest = body.into_bytes().unwrap();
        assert_eq!(rest.as_ref(), b" world");
    }

    #[test]
    fn reader_body_tracks_length() {
        let mut body = Body::from_reader(io::Cursor::new(b"abc".to_vec()), Some(3));
        let mut buf = [0; 2];
        assert_eq!(body.read(&mut buf).unwrap(), 2);
        assert_eq!(body.len(), Some(1));
        assert_eq!(body.into_string().unwrap().as_str(), "c");
    }

    #[test]
    fn take_closes_source() {
        let mut body = Body::from("data");
        let taken = Body::take(&mut body).unwrap();
        assert!(body.is_closed());
        assert!(matches!(Body::take(&mut body), Err(Error::BodyClosed)));
        assert_eq!(taken.into_bytes().unwrap().as_ref(), b"data");
    }

    #[test]
    fn closed_body_fails_reads() {
        let mut body = Body::from("data");
        body.close();
        assert!(body.read(&mut [0; 4]).is_err());
        assert!(matches!(body.into_bytes(), Err(Error::BodyClosed)));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let body = Body::from(vec![0xff, 0xfe]);
        assert!(matches!(body.into_string(), Err(Error::Utf8(_))));
    }

    #[tokio::test]
    async fn collects_as_http_body() {
        let body = Body::from_reader(io::Cursor::new(vec![7u8; READ_CHUNK + 10]), None);
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected.len(), READ_CHUNK + 10);
    }
}
