use std::io;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

impl HttpError {
    /// Returns true when the error comes from the socket (timeout, reset, broken pipe)
    /// rather than from the peer sending something we refuse to process.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            HttpError::RequestError { source } => source.status_code().is_none(),
            HttpError::ResponseError { source } => source.is_connection_lost(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("malformed request: {reason}")]
    MalformedRequest { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("length required for {method} request")]
    LengthRequired { method: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn malformed<S: ToString>(str: S) -> Self {
        Self::MalformedRequest { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn length_required<S: ToString>(method: S) -> Self {
        Self::LengthRequired { method: method.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// The status the client should see for this failure.
    ///
    /// `None` means the connection is already unusable and no response is attempted.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ParseError::TooLargeHeader { .. }
            | ParseError::TooManyHeaders { .. }
            | ParseError::MalformedRequest { .. }
            | ParseError::InvalidVersion(_)
            | ParseError::InvalidContentLength { .. } => Some(StatusCode::BAD_REQUEST),
            ParseError::LengthRequired { .. } => Some(StatusCode::LENGTH_REQUIRED),
            ParseError::InvalidBody { .. } | ParseError::Timeout(_) | ParseError::Io { .. } => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("response headers have already been sent")]
    HeadersAlreadySent,

    #[error("response body written before headers")]
    HeadersNotSent,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    pub fn is_connection_lost(&self) -> bool {
        matches!(self, SendError::Timeout(_) | SendError::Io { .. })
    }
}
