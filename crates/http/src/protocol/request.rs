//! HTTP request header handling implementation.
//!
//! [`RequestHeader`] is the parsed, immutable view of one request: the request line split
//! into method, path, query and version, plus a case-insensitive header map in which
//! repeated header lines have already been folded into one comma-joined value.

use http::header::{AsHeaderName, CONNECTION, CONTENT_LENGTH, EXPECT};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Version};

use crate::protocol::{PeerInfo, ReqBody};

/// Represents an HTTP request header.
#[derive(Debug, Clone)]
pub struct RequestHeader {
    method: Method,
    path: String,
    query: String,
    version: Version,
    headers: HeaderMap,
}

impl RequestHeader {
    /// Builds a header from its parts, splitting the request target at the first `?`.
    pub fn new(method: Method, target: &str, version: Version, headers: HeaderMap) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => (target.to_string(), String::new()),
        };
        Self { method, path, query, version, headers }
    }

    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The query string without the leading `?`, empty when absent.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Returns the request's HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns a reference to the request's headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as text, `None` if absent or not visible ASCII.
    pub fn header_str(&self, name: impl AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Checks whether a comma separated header contains `token` (ASCII case-insensitive).
    pub fn has_token(&self, name: impl AsHeaderName, token: &str) -> bool {
        self.header_str(name)
            .is_some_and(|value| value.split(',').any(|item| item.trim().eq_ignore_ascii_case(token)))
    }

    /// Checks whether a header value contains `needle` anywhere (ASCII case-insensitive).
    pub fn header_contains(&self, name: impl AsHeaderName, needle: &str) -> bool {
        self.header_str(name).is_some_and(|value| value.to_ascii_lowercase().contains(&needle.to_ascii_lowercase()))
    }

    /// The declared body length, if the request carries a valid `Content-Length`.
    pub fn content_length(&self) -> Option<u64> {
        self.header_str(CONTENT_LENGTH).and_then(|value| value.trim().parse::<u64>().ok())
    }

    /// Determines if this request conventionally carries a body based on its HTTP method.
    pub fn need_body(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH)
    }

    /// Whether the client asked for an interim `100 Continue`.
    pub fn expects_continue(&self) -> bool {
        self.has_token(EXPECT, "100-continue")
    }

    /// Whether the connection stays open after this request's response.
    ///
    /// HTTP/1.1 defaults to keep-alive, HTTP/1.0 needs an explicit `Connection: keep-alive`,
    /// and an explicit `Connection: close` always wins.
    pub fn keep_alive(&self) -> bool {
        if self.has_token(CONNECTION, "close") {
            return false;
        }
        self.version == Version::HTTP_11 || self.has_token(CONNECTION, "keep-alive")
    }
}

/// One parsed request together with its body and the addresses of the connection it came from.
///
/// The body borrows the connection, so a `Request` lives exactly as long as one
/// request/response cycle.
#[derive(Debug)]
pub struct Request<'conn> {
    header: RequestHeader,
    body: ReqBody<'conn>,
    peer: PeerInfo,
}

impl<'conn> Request<'conn> {
    pub fn new(header: RequestHeader, body: ReqBody<'conn>, peer: PeerInfo) -> Self {
        Self { header, body, peer }
    }

    pub fn header(&self) -> &RequestHeader {
        &self.header
    }

    pub fn body_mut(&mut self) -> &mut ReqBody<'conn> {
        &mut self.body
    }

    pub fn peer(&self) -> &PeerInfo {
        &self.peer
    }

    /// Splits the request so the header can be read while the body is consumed.
    pub fn parts_mut(&mut self) -> (&RequestHeader, &mut ReqBody<'conn>, &PeerInfo) {
        (&self.header, &mut self.body, &self.peer)
    }
}

/// Appends a header, folding repeated names into one comma-joined value.
pub(crate) fn append_joined(headers: &mut HeaderMap, name: HeaderName, value: HeaderValue) {
    match headers.get_mut(&name) {
        Some(existing) => {
            let mut joined = Vec::with_capacity(existing.len() + value.len() + 1);
            joined.extend_from_slice(existing.as_bytes());
            joined.push(b',');
            joined.extend_from_slice(value.as_bytes());
            if let Ok(joined) = HeaderValue::from_bytes(&joined) {
                *existing = joined;
            }
        }
        None => {
            headers.insert(name, value);
        }
    }
}
