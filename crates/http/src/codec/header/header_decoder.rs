//! HTTP header decoder implementation for parsing HTTP request headers
//!
//! This module decodes the request line and header block from raw bytes into a
//! [`RequestHeader`], and decides how the request body is framed.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB by default, configurable per decoder
//! - Only HTTP/1.0 and HTTP/1.1 are accepted
//!
//! # Framing
//!
//! Request bodies are only ever framed by `Content-Length`. A body-carrying method
//! (POST, PUT, PATCH) without it, or any request that announces `Transfer-Encoding`
//! instead, is refused with [`ParseError::LengthRequired`].

use bytes::BytesMut;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Version};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;

use crate::protocol::{ParseError, PayloadSize, RequestHeader, append_joined};

/// Maximum number of headers allowed in a request
pub const MAX_HEADER_NUM: usize = 64;

/// Default maximum size in bytes allowed for the entire header section
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decoder for HTTP request headers implementing the [`Decoder`] trait.
#[derive(Debug, Clone, Copy)]
pub struct HeaderDecoder {
    max_header_bytes: usize,
}

impl HeaderDecoder {
    pub fn new(max_header_bytes: usize) -> Self {
        Self { max_header_bytes }
    }
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self::new(MAX_HEADER_BYTES)
    }
}

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    /// Attempts to decode HTTP headers from the provided bytes buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((header, payload_size)))` if a complete header was successfully parsed
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if parsing failed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Minimum valid HTTP request needs at least "GET / HTTP/1.1\r\n\r\n"
        if src.len() < 14 {
            ensure_not_garbage(src)?;
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let parsed_result = req.parse(src).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::malformed(e),
        });

        match parsed_result? {
            Status::Complete(body_offset) => {
                trace!(header_size = body_offset, "parsed request header");
                ensure!(body_offset <= self.max_header_bytes, ParseError::too_large_header(body_offset, self.max_header_bytes));

                let version = match req.version {
                    Some(0) => Version::HTTP_10,
                    Some(1) => Version::HTTP_11,
                    // Currently HTTP/2 and HTTP/3 not supported
                    _ => return Err(ParseError::InvalidVersion(req.version)),
                };

                let method = req.method.ok_or_else(|| ParseError::malformed("missing method"))?;
                let method = Method::from_bytes(method.as_bytes()).map_err(|_e| ParseError::malformed(format!("invalid method {method}")))?;

                let target = req.path.ok_or_else(|| ParseError::malformed("missing request target"))?;
                let target = origin_form(target)?;

                let mut header_map = HeaderMap::with_capacity(req.headers.len());
                for header in req.headers.iter() {
                    let name = HeaderName::from_bytes(header.name.as_bytes())
                        .map_err(|_e| ParseError::malformed(format!("invalid header name {}", header.name)))?;
                    let value = HeaderValue::from_bytes(header.value)
                        .map_err(|_e| ParseError::malformed(format!("invalid value for header {name}")))?;
                    append_joined(&mut header_map, name, value);
                }

                let header = RequestHeader::new(method, target, version, header_map);
                let payload_size = parse_payload(&header)?;

                let _ = src.split_to(body_offset);
                Ok(Some((header, payload_size)))
            }
            // If parsing incomplete, ensure current buffer size does not exceed limit
            Status::Partial => {
                ensure!(src.len() <= self.max_header_bytes, ParseError::too_large_header(src.len(), self.max_header_bytes));
                Ok(None)
            }
        }
    }
}

/// Rejects input that can never become a request line before waiting for more bytes.
fn ensure_not_garbage(src: &BytesMut) -> Result<(), ParseError> {
    match src.iter().position(|b| *b == b'\n') {
        Some(_) => {
            let mut headers = [httparse::EMPTY_HEADER; 1];
            let mut req = httparse::Request::new(&mut headers);
            match req.parse(src) {
                Ok(_) | Err(Error::TooManyHeaders) => Ok(()),
                Err(e) => Err(ParseError::malformed(e)),
            }
        }
        None => Ok(()),
    }
}

/// Reduces an absolute-form target (`http://host/path`) to its origin-form (`/path`).
fn origin_form(target: &str) -> Result<&str, ParseError> {
    if target.starts_with('/') || target == "*" {
        return Ok(target);
    }

    let lower = target.get(..8).map(str::to_ascii_lowercase).unwrap_or_default();
    let rest = if lower.starts_with("http://") {
        &target[7..]
    } else if lower.starts_with("https://") {
        &target[8..]
    } else {
        return Err(ParseError::malformed(format!("invalid request target {target}")));
    };

    Ok(rest.find(['/', '?']).map_or("/", |index| &rest[index..]))
}

/// Determines how the request body is framed.
///
/// Only `Content-Length` framing is supported: chunked request bodies can't be read, so a
/// request announcing `Transfer-Encoding` without a length, or a body-carrying method without
/// any length at all, asks the client for one with 411.
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-transfer-encoding
    let te_header = header.headers().get(http::header::TRANSFER_ENCODING);
    let cl_header = header.headers().get(http::header::CONTENT_LENGTH);

    match (te_header, cl_header) {
        (None, None) if header.need_body() => Err(ParseError::length_required(header.method())),

        (None, None) => Ok(PayloadSize::Empty),

        (Some(_), None) => Err(ParseError::length_required(header.method())),

        (None, Some(cl_value)) => {
            let cl_str = cl_value.to_str().map_err(|_e| ParseError::invalid_content_length("value can't to_str"))?;

            let length =
                cl_str.trim().parse::<u64>().map_err(|_e| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

            Ok(PayloadSize::new_length(length))
        }

        (Some(_), Some(_)) => Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers")),
    }
}
