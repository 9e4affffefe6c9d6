//! HTTP request body handling implementation.
//!
//! The body of a request is read straight from the connection's decoded payload stream,
//! so a [`ReqBody`] borrows the connection for the duration of one request/response cycle.
//! Reads are bounded by `Content-Length` and by the connection's content timeout.
//!
//! Whatever the handler leaves unread is drained by the connection afterwards with
//! [`ReqBody::drain`], keeping the next request on a persistent connection correctly framed.

use std::fmt;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::{error, trace};

use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

/// The decoded request stream a body reads its payload items from.
pub type PayloadStream = dyn Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Send + Unpin;

pub struct ReqBody<'conn> {
    source: Option<&'conn mut PayloadStream>,
    length: u64,
    received: u64,
    timeout: Duration,
    eof: bool,
}

impl<'conn> ReqBody<'conn> {
    pub(crate) fn new(source: &'conn mut PayloadStream, length: u64, timeout: Duration) -> Self {
        if length == 0 {
            return Self::empty();
        }
        Self { source: Some(source), length, received: 0, timeout, eof: false }
    }

    /// A body with no bytes, for requests without `Content-Length`.
    pub fn empty() -> Self {
        Self { source: None, length: 0, received: 0, timeout: Duration::ZERO, eof: true }
    }

    /// The declared `Content-Length` of the body.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Bytes not yet handed out to the reader.
    pub fn remaining(&self) -> u64 {
        self.length - self.received
    }

    /// Reads the next chunk of the body, `None` once all `Content-Length` bytes were read.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, ParseError> {
        if self.eof {
            return Ok(None);
        }
        let Some(source) = self.source.as_mut() else {
            self.eof = true;
            return Ok(None);
        };

        let next = tokio::time::timeout(self.timeout, source.next()).await.map_err(|_elapsed| ParseError::Timeout(self.timeout))?;

        match next {
            Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => {
                self.received += bytes.len() as u64;
                trace!(chunk_size = bytes.len(), received = self.received, "read request body chunk");
                Ok(Some(bytes))
            }
            Some(Ok(Message::Payload(PayloadItem::Eof))) => {
                self.eof = true;
                Ok(None)
            }
            Some(Ok(Message::Header(_))) => {
                error!("should not receive header while reading request body");
                Err(ParseError::invalid_body("received header while reading body"))
            }
            Some(Err(e)) => Err(e),
            None => Err(ParseError::invalid_body(format!("connection closed after {} of {} body bytes", self.received, self.length))),
        }
    }

    /// Reads whole chunks until at least `limit` bytes are buffered or the body ends.
    pub async fn read(&mut self, limit: usize) -> Result<Bytes, ParseError> {
        let mut buf = BytesMut::new();
        while buf.len() < limit {
            match self.chunk().await? {
                Some(bytes) => buf.extend_from_slice(&bytes),
                None => break,
            }
        }
        Ok(buf.freeze())
    }

    /// Collects the rest of the body into one buffer.
    pub async fn read_to_end(&mut self) -> Result<Bytes, ParseError> {
        let mut buf = BytesMut::with_capacity(usize::try_from(self.remaining()).unwrap_or(0).min(64 * 1024));
        while let Some(bytes) = self.chunk().await? {
            buf.extend_from_slice(&bytes);
        }
        Ok(buf.freeze())
    }

    /// Discards whatever the handler did not read.
    pub async fn drain(&mut self) -> Result<(), ParseError> {
        while self.chunk().await?.is_some() {}
        Ok(())
    }
}

impl fmt::Debug for ReqBody<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqBody").field("length", &self.length).field("received", &self.received).field("eof", &self.eof).finish()
    }
}
