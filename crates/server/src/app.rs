//! The application handler boundary.
//!
//! Requests no static route matches are handed to one [`Application`]. It gets a typed
//! [`AppContext`] and answers with an [`AppResponse`]: a status line, an ordered header list
//! and a lazy stream of body chunks. The adapter writes the head when the first chunk arrives
//! (or right away for [eager](AppResponse::eager_headers) responses and empty bodies), so an
//! application failing before its first chunk still gets a clean `500`.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, Stream, StreamExt};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Version};
use portico_http::connection::ResponseWriter;
use portico_http::protocol::{HttpError, PayloadSize, ReqBody, Request, ResponseHead, SendError};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, trace};

use crate::BoxError;

const INTERNAL_ERROR_MESSAGE: &str = "Error 500: Internal server error!";
const NO_APPLICATION_MESSAGE: &str = "Error 500: Internal server error! application is not set.";

/// A lazy sequence of body chunks.
pub type BodyStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// Request processing plugged into the server for everything static routes don't serve.
#[async_trait]
pub trait Application: Send + Sync {
    async fn call(&self, context: &mut AppContext<'_, '_>) -> Result<AppResponse, BoxError>;
}

/// How invocations of the application are scheduled against each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SerializationPolicy {
    /// Any number of requests may be inside the application at once.
    #[default]
    Concurrent,
    /// One invocation at a time across the whole server, body streaming included, for
    /// applications backed by a single-threaded engine.
    Serialized,
}

/// Everything about a request except its body, owned so applications may keep it.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    method: Method,
    path: String,
    query: String,
    version: Version,
    headers: HeaderMap,
    scheme: String,
    server_name: String,
    server_port: u16,
    remote: SocketAddr,
}

impl RequestInfo {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The query string without the leading `?`, empty when absent.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Request headers; repeated headers arrive comma-joined under one name.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The configured URL scheme, `http` unless a front proxy terminates TLS.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }
}

/// The request an [`Application`] is invoked with.
pub struct AppContext<'a, 'conn> {
    request: RequestInfo,
    body: &'a mut ReqBody<'conn>,
}

impl<'a, 'conn> AppContext<'a, 'conn> {
    pub fn request(&self) -> &RequestInfo {
        &self.request
    }

    /// The request body, exactly `Content-Length` bytes long.
    pub fn body(&mut self) -> &mut ReqBody<'conn> {
        &mut *self.body
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn query(&self) -> &str {
        self.request.query()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }
}

impl fmt::Debug for AppContext<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext").field("request", &self.request).field("body", &self.body).finish()
    }
}

#[derive(Debug, Error)]
#[error("invalid status line {0:?}")]
pub struct InvalidStatusLine(String);

/// A response status with its reason phrase, as in `"200 OK"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    status: StatusCode,
    reason: Cow<'static, str>,
}

impl StatusLine {
    pub fn new(status: StatusCode, reason: impl Into<Cow<'static, str>>) -> Self {
        Self { status, reason: reason.into() }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl From<StatusCode> for StatusLine {
    fn from(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or("Unknown"))
    }
}

impl FromStr for StatusLine {
    type Err = InvalidStatusLine;

    /// Parses `"<code> <reason>"`; a bare code takes the canonical reason.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (code, reason) = line.split_once(' ').unwrap_or((line, ""));
        let status = StatusCode::from_bytes(code.as_bytes()).map_err(|_e| InvalidStatusLine(line.to_string()))?;
        match reason.trim() {
            "" => Ok(Self::from(status)),
            reason => Ok(Self::new(status, reason.to_string())),
        }
    }
}

/// What an [`Application`] answers with.
pub struct AppResponse {
    status: StatusLine,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: BodyStream,
    eager_headers: bool,
}

impl AppResponse {
    /// A response with no headers and an empty body.
    pub fn new(status: impl Into<StatusLine>) -> Self {
        Self { status: status.into(), headers: Vec::new(), body: stream::empty().boxed(), eager_headers: false }
    }

    /// A `text/plain` response with the whole body in memory.
    pub fn text(status: impl Into<StatusLine>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(status)
            .header(http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
            .header(http::header::CONTENT_LENGTH, HeaderValue::from(text.len()))
            .bytes(Bytes::from(text))
    }

    /// Builds a response from a textual status line and header pairs.
    pub fn from_parts<'h>(status: &str, headers: impl IntoIterator<Item = (&'h str, &'h str)>) -> Result<Self, BoxError> {
        let mut response = Self::new(status.parse::<StatusLine>()?);
        for (name, value) in headers {
            response = response.header(HeaderName::from_bytes(name.as_bytes())?, HeaderValue::from_str(value)?);
        }
        Ok(response)
    }

    /// Appends a header; headers are written in the order they were added.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Uses `body` as the lazy body.
    #[must_use]
    pub fn body<S>(mut self, body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        self.body = body.boxed();
        self
    }

    /// Uses a single in-memory chunk as the body.
    #[must_use]
    pub fn bytes(self, bytes: Bytes) -> Self {
        self.body(stream::once(async move { Ok(bytes) }))
    }

    /// Uses the chunks of `iter` as the body.
    #[must_use]
    pub fn chunks<I>(self, iter: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
        I::IntoIter: Send + 'static,
    {
        self.body(stream::iter(iter.into_iter().map(Ok)))
    }

    /// Writes the head before the first body chunk is produced.
    #[must_use]
    pub fn eager_headers(mut self) -> Self {
        self.eager_headers = true;
        self
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    pub fn is_eager(&self) -> bool {
        self.eager_headers
    }
}

impl fmt::Debug for AppResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("eager_headers", &self.eager_headers)
            .finish_non_exhaustive()
    }
}

/// An [`Application`] made from an async function of the request and its whole body.
#[derive(Debug)]
pub struct AppFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Application for AppFn<F>
where
    F: Fn(RequestInfo, Bytes) -> Fut + Send + Sync,
    Fut: Future<Output = Result<AppResponse, BoxError>> + Send + 'static,
{
    async fn call(&self, context: &mut AppContext<'_, '_>) -> Result<AppResponse, BoxError> {
        let body = context.body().read_to_end().await?;
        (self.f)(context.request().clone(), body).await
    }
}

/// Adapts `f` into an [`Application`]; the request body is read completely before `f` runs.
pub fn app_fn<F, Fut>(f: F) -> AppFn<F>
where
    F: Fn(RequestInfo, Bytes) -> Fut + Send + Sync,
    Fut: Future<Output = Result<AppResponse, BoxError>> + Send + 'static,
{
    AppFn { f }
}

/// Invokes the application once per request and writes what it answers.
pub(crate) struct AppAdapter {
    application: Option<Arc<dyn Application>>,
    policy: SerializationPolicy,
    serial: Mutex<()>,
    scheme: String,
    host_name: Option<String>,
}

impl AppAdapter {
    pub(crate) fn new(
        application: Option<Arc<dyn Application>>,
        policy: SerializationPolicy,
        scheme: String,
        host_name: Option<String>,
    ) -> Self {
        Self { application, policy, serial: Mutex::new(()), scheme, host_name }
    }

    pub(crate) async fn serve(&self, request: &mut Request<'_>, writer: &mut ResponseWriter<'_>) -> Result<(), HttpError> {
        let Some(application) = &self.application else {
            error!(path = request.header().path(), "no application to handle the request");
            writer.send_message(StatusCode::INTERNAL_SERVER_ERROR, NO_APPLICATION_MESSAGE).await?;
            return Ok(());
        };

        if request.header().expects_continue() {
            writer.send_continue().await?;
        }

        let (header, body, peer) = request.parts_mut();
        let info = RequestInfo {
            method: header.method().clone(),
            path: header.path().to_string(),
            query: header.query().to_string(),
            version: header.version(),
            headers: header.headers().clone(),
            scheme: self.scheme.clone(),
            server_name: self.host_name.clone().unwrap_or_else(|| peer.local.ip().to_string()),
            server_port: peer.local.port(),
            remote: peer.remote,
        };
        let mut context = AppContext { request: info, body };

        let _serial = match self.policy {
            SerializationPolicy::Serialized => Some(self.serial.lock().await),
            SerializationPolicy::Concurrent => None,
        };

        let invoked = AssertUnwindSafe(application.call(&mut context)).catch_unwind().await;
        let response = match invoked {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!(path = context.path(), cause = %e, "application failed");
                writer.send_message(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE).await?;
                return Ok(());
            }
            Err(panic) => {
                error!(path = context.path(), cause = panic_message(&*panic), "application panicked");
                writer.send_message(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE).await?;
                return Ok(());
            }
        };

        write_response(response, writer).await
    }
}

impl fmt::Debug for AppAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppAdapter")
            .field("has_application", &self.application.is_some())
            .field("policy", &self.policy)
            .field("scheme", &self.scheme)
            .field("host_name", &self.host_name)
            .finish_non_exhaustive()
    }
}

/// Streams an application response, writing the head at most once and before any body byte.
async fn write_response(response: AppResponse, writer: &mut ResponseWriter<'_>) -> Result<(), HttpError> {
    let AppResponse { status, headers, mut body, eager_headers } = response;

    let mut head = ResponseHead::with_reason(status.status, status.reason);
    for (name, value) in headers {
        head.append(name, value);
    }
    let payload_size = head.content_length().map_or(PayloadSize::Chunked, PayloadSize::new_length);

    let mut pending = Some((head, payload_size));
    if eager_headers {
        if let Some((head, payload_size)) = pending.take() {
            writer.send_head(head, payload_size).await?;
        }
    }

    loop {
        let next = match AssertUnwindSafe(body.next()).catch_unwind().await {
            Ok(next) => next,
            Err(panic) => Some(Err(panic_message(&*panic).into())),
        };

        match next {
            Some(Ok(chunk)) => {
                if let Some((head, payload_size)) = pending.take() {
                    writer.send_head(head, payload_size).await?;
                }
                trace!(chunk_size = chunk.len(), "application body chunk");
                writer.send_chunk(chunk).await?;
            }
            Some(Err(e)) if pending.is_some() => {
                error!(cause = %e, "application body failed before the response head was sent");
                writer.send_message(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE).await?;
                return Ok(());
            }
            Some(Err(e)) => {
                error!(cause = %e, "application body failed after the response head was sent");
                return Err(SendError::invalid_body(e).into());
            }
            None => break,
        }
    }

    if let Some((head, payload_size)) = pending.take() {
        let payload_size = if payload_size.is_chunked() { PayloadSize::Empty } else { payload_size };
        writer.send_head(head, payload_size).await?;
    }
    writer.finish().await?;
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_lines() {
        let line: StatusLine = "200 OK".parse().unwrap();
        assert_eq!(line.status(), StatusCode::OK);
        assert_eq!(line.reason(), "OK");

        let line: StatusLine = "418 Short And Stout".parse().unwrap();
        assert_eq!(line.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(line.reason(), "Short And Stout");

        let line: StatusLine = "404".parse().unwrap();
        assert_eq!(line.reason(), "Not Found");

        assert!("OK 200".parse::<StatusLine>().is_err());
        assert!("".parse::<StatusLine>().is_err());
        assert!("99 Too Small".parse::<StatusLine>().is_err());
    }

    #[test]
    fn response_from_parts_keeps_header_order() {
        let response = AppResponse::from_parts("201 Created", [("Location", "/items/7"), ("X-Trace", "a"), ("x-trace", "b")]).unwrap();
        assert_eq!(response.status().status(), StatusCode::CREATED);
        let names: Vec<_> = response.headers().iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["location", "x-trace", "x-trace"]);
        assert!(!response.is_eager());

        assert!(AppResponse::from_parts("200 OK", [("Bad Header", "x")]).is_err());
    }

    #[test]
    fn panic_messages() {
        let panic = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(&*panic), "boom");

        let code = 7;
        let panic = std::panic::catch_unwind(|| panic!("boom {code}")).unwrap_err();
        assert_eq!(panic_message(&*panic), "boom 7");
    }
}
