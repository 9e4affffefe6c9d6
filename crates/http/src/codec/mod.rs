//! HTTP codec module for encoding and decoding HTTP messages
//!
//! - Request handling:
//!   - [`RequestDecoder`]: decodes incoming HTTP requests, header first, then the body
//! - Response handling:
//!   - [`ResponseEncoder`]: encodes outgoing HTTP responses, head first, then the body
//!
//! Both plug into `tokio_util::codec::{FramedRead, FramedWrite}`.

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use header::MAX_HEADER_BYTES;
pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
