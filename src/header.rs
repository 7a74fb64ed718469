//! Header fields and their wire serialisation.
//!
//! [`Header`] extends [`Values`] with [`Header::write_to`], which writes the
//! fields in HTTP/1.x field-line format:
//!
//! ```text
//! Content-Type: text/plain\r\n
//! X-Custom: a\r\n
//! X-Custom: b\r\n
//! \r\n
//! ```
//!
//! [`HeaderValues`] is the bundled implementation. It also converts to and
//! from [`http::HeaderMap`], the header type of the underlying transport.
use std::io;

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::values::{HeaderValues, Values};

/// A set of header fields that can be written in wire format.
pub trait Header: Values {
    /// Writes every field as `Name: value\r\n`, one line per value, followed
    /// by the blank line that terminates a field block.
    ///
    /// Names are written in sorted order. Line breaks inside values are
    /// replaced by spaces and surrounding whitespace is trimmed.
    fn write_to(&self, sink: &mut dyn io::Write) -> io::Result<()>;
}

impl Header for HeaderValues {
    fn write_to(&self, sink: &mut dyn io::Write) -> io::Result<()> {
        for name in self.sorted_names() {
            for value in self.values(name) {
                sink.write_all(name.as_bytes())?;
                sink.write_all(b": ")?;
                sink.write_all(sanitize_value(value).as_bytes())?;
                sink.write_all(b"\r\n")?;
            }
        }
        sink.write_all(b"\r\n")
    }
}

fn sanitize_value(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains(['\r', '\n']) {
        value.replace(['\r', '\n'], " ").trim().to_owned().into()
    } else {
        value.trim().into()
    }
}

impl From<&HeaderMap> for HeaderValues {
    fn from(map: &HeaderMap) -> Self {
        let mut header = HeaderValues::with_capacity(map.keys_len());
        for (name, value) in map {
            header.add(
                name.as_str(),
                &String::from_utf8_lossy(value.as_bytes()),
            );
        }
        header
    }
}

impl HeaderValues {
    /// Converts into an [`http::HeaderMap`], preserving value order.
    ///
    /// Entries whose name or value cannot appear on the wire are skipped.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.len());
        for (name, values) in self.iter() {
            let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
                tracing::debug!(name, "skipping header with invalid name");
                continue;
            };
            for value in values {
                match HeaderValue::from_str(value) {
                    Ok(value) => {
                        map.append(header_name.clone(), value);
                    }
                    Err(_) => tracing::debug!(name, "skipping invalid header value"),
                }
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenSink;

    impl io::Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_field_lines() {
        let mut header = HeaderValues::new();
        header.add("x-custom", "a");
        header.add("X-Custom", "b");
        header.add("Content-Type", "text/plain");

        let mut out = Vec::new();
        header.write_to(&mut out).unwrap();
        assert_eq!(
            out,
            b"Content-Type: text/plain\r\nX-Custom: a\r\nX-Custom: b\r\n\r\n"
        );
    }

    #[test]
    fn empty_header_writes_terminator() {
        let mut out = Vec::new();
        HeaderValues::new().write_to(&mut out).unwrap();
        assert_eq!(out, b"\r\n");
    }

    #[test]
    fn strips_line_breaks_from_values() {
        let mut header = HeaderValues::new();
        header.add("X-Evil", "a\r\nInjected: yes ");
        let mut out = Vec::new();
        header.write_to(&mut out).unwrap();
        assert_eq!(out, b"X-Evil: a  Injected: yes\r\n\r\n");
    }

    #[test]
    fn propagates_write_errors() {
        let mut header = HeaderValues::new();
        header.add("Accept", "*/*");
        let err = header.write_to(&mut BrokenSink).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn header_map_round_trip_keeps_order() {
        let mut header = HeaderValues::new();
        header.add("X-Custom", "a");
        header.add("X-Custom", "b");
        header.add("Content-Type", "text/plain");

        let map = header.to_header_map();
        let values: Vec<_> = map.get_all("x-custom").iter().collect();
        assert_eq!(values, ["a", "b"]);

        let back = HeaderValues::from(&map);
        assert_eq!(back, header);
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let mut header = HeaderValues::new();
        header.add("bad name", "x");
        header.add("X-Ok", "fine");
        let map = header.to_header_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map["x-ok"], "fine");
    }
}
