use std::time::{Duration, SystemTime};

use bytes::Bytes;
use futures::SinkExt;
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, DATE, SERVER};
use http::{HeaderValue, StatusCode, Version};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::FramedWrite;
use tracing::trace;

use crate::codec::ResponseEncoder;
use crate::connection::BoxedWriter;
use crate::protocol::{Message, PayloadItem, PayloadSize, ResponseHead, SendError};

type ResponseMessage = Message<(ResponseHead, PayloadSize), Bytes>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// nothing written yet, the head may still change
    Pending,
    /// head written, body items may follow
    Streaming,
    /// the response is complete on the wire
    Finished,
}

/// Writes one response on a connection.
///
/// The head is written at most once and always before any body byte; the writer keeps that
/// as a one-way state rather than trusting callers. Every socket write is bounded by the
/// connection's content timeout.
pub struct ResponseWriter<'conn> {
    framed_write: &'conn mut FramedWrite<BoxedWriter, ResponseEncoder>,
    version: Version,
    head_only: bool,
    keep_alive: bool,
    request_connection: Option<HeaderValue>,
    server: Option<HeaderValue>,
    timeout: Duration,
    state: State,
    status: Option<StatusCode>,
    bytes_sent: u64,
}

impl<'conn> ResponseWriter<'conn> {
    pub(crate) fn new(
        framed_write: &'conn mut FramedWrite<BoxedWriter, ResponseEncoder>,
        version: Version,
        head_only: bool,
        keep_alive: bool,
        request_connection: Option<HeaderValue>,
        server: Option<HeaderValue>,
        timeout: Duration,
    ) -> Self {
        Self {
            framed_write,
            version,
            head_only,
            keep_alive,
            request_connection,
            server,
            timeout,
            state: State::Pending,
            status: None,
            bytes_sent: 0,
        }
    }

    /// Whether the status line and headers have been written.
    pub fn headers_sent(&self) -> bool {
        self.state != State::Pending
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// The status of the head written so far.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Body bytes written to the socket, after transfer framing is stripped.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Whether the response answers a HEAD request and must not carry body bytes.
    pub fn is_head_only(&self) -> bool {
        self.head_only
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Whether the connection stays open once this response is complete.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Closes the connection after this response. Only effective before the head is written.
    pub fn set_close(&mut self) {
        if self.state == State::Pending {
            self.keep_alive = false;
        }
    }

    /// Sends the interim `100 Continue` status, telling the client to send its body.
    pub async fn send_continue(&mut self) -> Result<(), SendError> {
        if self.headers_sent() {
            return Err(SendError::HeadersAlreadySent);
        }

        let timeout = self.timeout;
        let writer = self.framed_write.get_mut();
        tokio::time::timeout(timeout, async {
            writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
            writer.flush().await
        })
        .await
        .map_err(|_elapsed| SendError::Timeout(timeout))??;

        trace!("sent 100 continue");
        Ok(())
    }

    /// Writes the status line and headers.
    ///
    /// `payload_size` announces how the body is framed. On HEAD requests a known
    /// `Content-Length` is kept, an unknown one sends no framing header at all, and no body
    /// byte is ever written.
    pub async fn send_head(&mut self, mut head: ResponseHead, payload_size: PayloadSize) -> Result<(), SendError> {
        if self.headers_sent() {
            return Err(SendError::HeadersAlreadySent);
        }

        let mut payload_size = payload_size;
        if payload_size.is_chunked() && self.version == Version::HTTP_10 {
            payload_size = PayloadSize::UntilClose;
        }
        if payload_size == PayloadSize::UntilClose {
            self.keep_alive = false;
        }

        if self.head_only {
            match payload_size.len() {
                Some(length) => {
                    head.insert(CONTENT_LENGTH, HeaderValue::from(length));
                    payload_size = PayloadSize::Empty;
                }
                // until-close framing writes neither `Content-Length` nor `Transfer-Encoding`
                None => payload_size = PayloadSize::UntilClose,
            }
        }

        self.fill_common_headers(&mut head);
        head.set_version(self.version);
        self.status = Some(head.status());

        let is_empty = payload_size.is_empty();
        self.write(Message::Header((head, payload_size))).await?;
        if self.head_only && !is_empty {
            self.write(Message::Payload(PayloadItem::Eof)).await?;
        }
        self.state = if is_empty || self.head_only { State::Finished } else { State::Streaming };
        Ok(())
    }

    /// Writes one body chunk. The head must have been written before.
    pub async fn send_chunk(&mut self, bytes: Bytes) -> Result<(), SendError> {
        match self.state {
            State::Pending => Err(SendError::HeadersNotSent),
            State::Finished => {
                if self.head_only {
                    return Ok(());
                }
                Err(SendError::invalid_body("response body already finished"))
            }
            State::Streaming => {
                if bytes.is_empty() {
                    return Ok(());
                }
                let size = bytes.len() as u64;
                self.write(Message::Payload(PayloadItem::Chunk(bytes))).await?;
                self.bytes_sent += size;
                Ok(())
            }
        }
    }

    /// Ends the body. Calling it on a complete response is a no-op.
    pub async fn finish(&mut self) -> Result<(), SendError> {
        match self.state {
            State::Pending => Err(SendError::HeadersNotSent),
            State::Finished => Ok(()),
            State::Streaming => {
                self.write(Message::Payload(PayloadItem::Eof)).await?;
                self.state = State::Finished;
                Ok(())
            }
        }
    }

    /// Writes a complete response whose body is already in memory.
    pub async fn send_response(&mut self, head: ResponseHead, body: Bytes) -> Result<(), SendError> {
        self.send_head(head, PayloadSize::new_length(body.len() as u64)).await?;
        self.send_chunk(body).await?;
        self.finish().await
    }

    /// Writes a plain-text response such as `404 Not Found`; an empty message sends no body.
    pub async fn send_message(&mut self, status: StatusCode, message: &str) -> Result<(), SendError> {
        let mut head = ResponseHead::new(status);
        if !message.is_empty() {
            head.append(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        }
        self.send_response(head, Bytes::copy_from_slice(message.as_bytes())).await
    }

    fn fill_common_headers(&self, head: &mut ResponseHead) {
        if let Some(server) = &self.server {
            if !head.contains(&SERVER) {
                head.append(SERVER, server.clone());
            }
        }
        if !head.contains(&DATE) {
            let now = httpdate::fmt_http_date(SystemTime::now());
            if let Ok(value) = HeaderValue::from_str(&now) {
                head.append(DATE, value);
            }
        }
        if !self.keep_alive {
            head.insert(CONNECTION, HeaderValue::from_static("close"));
        } else if let Some(connection) = &self.request_connection {
            if !head.contains(&CONNECTION) {
                head.append(CONNECTION, connection.clone());
            }
        }
    }

    async fn write(&mut self, message: ResponseMessage) -> Result<(), SendError> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.framed_write.send(message)).await.map_err(|_elapsed| SendError::Timeout(timeout))?
    }
}

impl std::fmt::Debug for ResponseWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("version", &self.version)
            .field("head_only", &self.head_only)
            .field("keep_alive", &self.keep_alive)
            .field("state", &self.state)
            .field("status", &self.status)
            .field("bytes_sent", &self.bytes_sent)
            .finish_non_exhaustive()
    }
}
