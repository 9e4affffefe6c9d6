//! The HTTP/1.1 connection pipeline of the portico server
//!
//! This crate turns an accepted byte stream into a sequence of request/response cycles.
//! It is built on tokio and `tokio-util` codecs and knows nothing about routing or files:
//! whatever answers a request plugs in through the [`handler::Handler`] trait.
//!
//! # Features
//!
//! - HTTP/1.0 and HTTP/1.1 request parsing with header count and size limits
//! - `Content-Length` framed request bodies, streamed and drained after each response
//! - Length, chunked and close-delimited response framing
//! - Keep-alive connections, one cycle at a time
//! - `Expect: 100-continue`
//! - Header and content timeouts on every socket operation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use http::StatusCode;
//! use tokio::net::TcpListener;
//! use tracing::{error, warn};
//! use portico_http::connection::{ConnectionConfig, HttpConnection, ResponseWriter};
//! use portico_http::handler::Handler;
//! use portico_http::protocol::{HttpError, PeerInfo, Request, ResponseHead};
//!
//! struct HelloWorld;
//!
//! #[async_trait]
//! impl Handler for HelloWorld {
//!     async fn call(&self, request: &mut Request<'_>, writer: &mut ResponseWriter<'_>) -> Result<(), HttpError> {
//!         let body = request.body_mut().read_to_end().await?;
//!         let text = format!("Hello {}, {} body bytes\r\n", request.header().path(), body.len());
//!         writer.send_response(ResponseHead::new(StatusCode::OK), Bytes::from(text)).await?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.expect("bind");
//!     let handler = Arc::new(HelloWorld);
//!
//!     loop {
//!         let (tcp_stream, remote) = match listener.accept().await {
//!             Ok(accepted) => accepted,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!         let local = tcp_stream.local_addr().expect("local addr");
//!         let handler = handler.clone();
//!
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             let connection = HttpConnection::new(reader, writer, PeerInfo::new(remote, local), ConnectionConfig::default());
//!             if let Err(e) = connection.process(handler).await {
//!                 error!(cause = %e, "connection shutdown with error");
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: connection lifecycle and the response writer
//! - [`protocol`]: request, response and error types
//! - [`codec`]: request decoding and response encoding
//! - [`handler`]: the request handler trait
//!
//! # Error Handling
//!
//! - [`protocol::HttpError`]: top-level error type
//! - [`protocol::ParseError`]: request parsing errors, each knowing the status it answers with
//! - [`protocol::SendError`]: response sending errors
//!
//! # Limitations
//!
//! - HTTP/1.x only
//! - No chunked request bodies (answered with 411)
//! - No pipelining: the next request is parsed after the current response completes
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
