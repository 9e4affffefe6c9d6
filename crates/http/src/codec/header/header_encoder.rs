//! HTTP header encoder implementation for serializing HTTP response headers
//!
//! Writes `HTTP/<version> <code> <reason>\r\n`, then each header as `Name: Value\r\n` in
//! emission order, then the blank line. The framing header matching the [`PayloadSize`]
//! (`Content-Length` or `Transfer-Encoding: chunked`) is set before writing.

use crate::protocol::{PayloadSize, ResponseHead, SendError};

use bytes::{BufMut, BytesMut};

use http::{HeaderValue, Version, header};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

/// Encoder for HTTP response headers implementing the [`Encoder`] trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        let version = match head.version() {
            Version::HTTP_11 => "1.1",
            Version::HTTP_10 => "1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };
        write!(FastWrite(dst), "HTTP/{} {} {}\r\n", version, head.status().as_str(), head.reason())?;

        // Set appropriate content length or transfer encoding header
        match payload_size {
            PayloadSize::Length(n) => {
                head.remove(&header::TRANSFER_ENCODING);
                set_if_differs(&mut head, header::CONTENT_LENGTH, HeaderValue::from(n));
            }
            PayloadSize::Chunked => {
                head.remove(&header::CONTENT_LENGTH);
                set_if_differs(&mut head, header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            }
            PayloadSize::UntilClose => {
                head.remove(&header::CONTENT_LENGTH);
                head.remove(&header::TRANSFER_ENCODING);
            }
            PayloadSize::Empty => {
                // a HEAD response keeps the length the GET would have had
                if head.content_length().is_none() {
                    const ZERO_VALUE: HeaderValue = HeaderValue::from_static("0");
                    head.insert(header::CONTENT_LENGTH, ZERO_VALUE);
                }
            }
        }

        // Write all headers
        for (header_name, header_value) in head.headers() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

fn set_if_differs(head: &mut ResponseHead, name: header::HeaderName, value: HeaderValue) {
    if head.get(&name) != Some(&value) {
        head.insert(name, value);
    }
}

/// Fast writer implementation for writing to BytesMut.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
