//! HTTP body handling module for processing request and response payloads
//!
//! ## Decoders
//! - [`LengthDecoder`]: processes `Content-Length` framed request bodies
//! - [`PayloadDecoder`]: selects the request body strategy (length or no body)
//!
//! ## Encoders
//! - [`ChunkedEncoder`]: implements chunked transfer encoding for responses
//! - [`LengthEncoder`]: writes exactly the announced number of bytes
//! - [`PayloadEncoder`]: selects the response body strategy, including close-delimited bodies

mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
