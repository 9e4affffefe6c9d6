use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use http::header::CONNECTION;
use http::{HeaderValue, Method, StatusCode, Version};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::codec::{MAX_HEADER_BYTES, RequestDecoder, ResponseEncoder};
use crate::connection::ResponseWriter;
use crate::handler::Handler;
use crate::protocol::body::PayloadStream;
use crate::protocol::{HttpError, Message, ParseError, PayloadSize, PeerInfo, ReqBody, Request, RequestHeader};

/// Owned read half of a connection.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// Owned write half of a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

const INTERNAL_ERROR_MESSAGE: &str = "Error 500: Internal server error!";

/// Per-connection settings, shared by every connection of a server.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Deadline for receiving a complete request header block.
    pub header_timeout: Duration,
    /// Deadline for each body read and each response write.
    pub content_timeout: Duration,
    /// Largest accepted request header block, request line included.
    pub max_header_bytes: usize,
    /// Value of the `Server` header added to every response, if any.
    pub server: Option<HeaderValue>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            header_timeout: Duration::from_secs(5),
            content_timeout: Duration::from_secs(300),
            max_header_bytes: MAX_HEADER_BYTES,
            server: Some(HeaderValue::from_static(concat!("portico/", env!("CARGO_PKG_VERSION")))),
        }
    }
}

/// An HTTP connection that runs request/response cycles until the peer goes away
///
/// `HttpConnection` owns both halves of one socket and handles:
/// - reading and decoding request headers under the header timeout
/// - handing the request and a [`ResponseWriter`] to the [`Handler`]
/// - draining unread request bodies so the next request stays framed
/// - deciding whether the connection persists after each response
///
/// Requests are processed strictly one after the other; the next header is only decoded
/// once the previous response is complete.
pub struct HttpConnection {
    framed_read: FramedRead<BoxedReader, RequestDecoder>,
    framed_write: FramedWrite<BoxedWriter, ResponseEncoder>,
    peer: PeerInfo,
    config: ConnectionConfig,
}

impl HttpConnection {
    pub fn new<R, W>(reader: R, writer: W, peer: PeerInfo, config: ConnectionConfig) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let decoder = RequestDecoder::with_max_header_bytes(config.max_header_bytes);
        Self {
            framed_read: FramedRead::with_capacity(Box::new(reader) as BoxedReader, decoder, 8 * 1024),
            framed_write: FramedWrite::new(Box::new(writer) as BoxedWriter, ResponseEncoder::new()),
            peer,
            config,
        }
    }

    pub fn peer(&self) -> &PeerInfo {
        &self.peer
    }

    /// Serves requests until the peer closes, a response asks for close, or an error occurs.
    ///
    /// A peer that closes between requests, or idles past the header timeout with nothing
    /// buffered, ends the connection with `Ok(())`.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler + ?Sized,
    {
        loop {
            let polled = tokio::time::timeout(self.config.header_timeout, self.framed_read.next()).await;
            let next = match polled {
                Ok(next) => next,
                Err(_elapsed) if self.framed_read.read_buffer().is_empty() => {
                    debug!(remote_addr = %self.peer.remote, "idle connection timed out");
                    return Ok(());
                }
                Err(_elapsed) => return Err(ParseError::Timeout(self.config.header_timeout).into()),
            };

            match next {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    if !self.do_process(header, payload_size, handler.as_ref()).await? {
                        return Ok(());
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    error!("received body while expecting a request header");
                    return Err(ParseError::invalid_body("need header while receive body").into());
                }

                Some(Err(e)) => return self.reject(e).await,

                None => {
                    debug!(remote_addr = %self.peer.remote, "peer closed the connection");
                    return Ok(());
                }
            }
        }
    }

    /// Runs one request/response cycle, returning whether the connection persists.
    async fn do_process<H>(&mut self, header: RequestHeader, payload_size: PayloadSize, handler: &H) -> Result<bool, HttpError>
    where
        H: Handler + ?Sized,
    {
        let version = header.version();
        let head_only = header.method() == Method::HEAD;
        let request_connection = header.headers().get(CONNECTION).cloned();
        let method = header.method().clone();
        let path = header.path().to_string();

        let source: &mut PayloadStream = &mut self.framed_read;
        let body = ReqBody::new(source, payload_size.len().unwrap_or(0), self.config.content_timeout);
        let mut writer = ResponseWriter::new(
            &mut self.framed_write,
            version,
            head_only,
            header.keep_alive(),
            request_connection,
            self.config.server.clone(),
            self.config.content_timeout,
        );
        let mut request = Request::new(header, body, self.peer);

        match handler.call(&mut request, &mut writer).await {
            Ok(()) if writer.is_finished() => {}
            Ok(()) if !writer.headers_sent() => {
                error!(%method, %path, "handler returned without writing a response");
                writer.send_message(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE).await?;
            }
            Ok(()) => writer.finish().await?,
            Err(e) if e.is_connection_lost() => {
                debug!(remote_addr = %self.peer.remote, cause = %e, "connection lost while handling request");
                return Err(e);
            }
            Err(e) if !writer.headers_sent() => {
                error!(%method, %path, cause = %e, "handler failed");
                writer.send_message(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE).await?;
            }
            Err(e) => {
                error!(%method, %path, cause = %e, "handler failed after response headers were sent");
                return Err(e);
            }
        }

        info!(
            remote_addr = %self.peer.remote,
            %method,
            %path,
            status = writer.status().map_or(0, |status| status.as_u16()),
            bytes_sent = writer.bytes_sent(),
            "request served"
        );

        let keep_alive = writer.keep_alive();
        if keep_alive {
            request.body_mut().drain().await?;
        }
        Ok(keep_alive)
    }

    /// Answers an unparseable request with its status when the socket is still usable.
    async fn reject(&mut self, e: ParseError) -> Result<(), HttpError> {
        let Some(status) = e.status_code() else {
            return Err(e.into());
        };

        warn!(remote_addr = %self.peer.remote, cause = %e, %status, "rejecting request");
        let mut writer = ResponseWriter::new(
            &mut self.framed_write,
            Version::HTTP_11,
            false,
            false,
            None,
            self.config.server.clone(),
            self.config.content_timeout,
        );
        let message = format!("Error {}: {}", status.as_u16(), status.canonical_reason().unwrap_or("Bad Request"));
        writer.send_message(status, &message).await?;
        Err(e.into())
    }
}
