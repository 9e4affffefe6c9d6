//! Core HTTP protocol abstractions.
//!
//! - **Message Handling** ([`message`]): [`Message`], [`PayloadItem`] and [`PayloadSize`]
//!   describe what flows through the codecs
//! - **Request Processing** ([`request`]): [`RequestHeader`], the parsed request line and headers,
//!   and [`Request`], which adds the body and the peer addresses
//! - **Response Processing** ([`response`]): [`ResponseHead`], status line and ordered headers
//! - **Body Streaming** ([`body`]): [`ReqBody`], the `Content-Length` bounded request body
//! - **Error Handling** ([`error`]): [`HttpError`], [`ParseError`], [`SendError`]

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::Request;
pub use request::RequestHeader;
pub(crate) use request::append_joined;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
pub use body::ReqBody;

mod peer;
pub use peer::PeerInfo;
