//! HTTP header processing module for encoding and decoding headers
//!
//! - [`HeaderDecoder`]: decodes the request line and header block from raw bytes,
//!   enforces size limits and decides the request body framing
//! - [`HeaderEncoder`]: writes a response status line and its ordered headers,
//!   setting the framing header that matches the response payload

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_decoder::MAX_HEADER_BYTES;
pub use header_encoder::HeaderEncoder;
