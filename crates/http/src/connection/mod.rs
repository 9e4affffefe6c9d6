//! HTTP connection handling module
//!
//! This module drives the request/response cycles of one accepted socket.
//!
//! # Components
//!
//! - [`HttpConnection`]: owns the socket and runs the cycle loop:
//!   - decodes the next request header under the header timeout
//!   - hands the request and a writer to the [`Handler`](crate::handler::Handler)
//!   - drains unread request bodies and decides keep-alive
//!   - answers unparseable requests with 400 or 411 before closing
//! - [`ResponseWriter`]: writes exactly one response, head first, every write bounded by
//!   the content timeout
//! - [`ConnectionConfig`]: the timeouts and limits shared by all connections of a server

mod http_connection;
mod response_writer;

pub use http_connection::BoxedReader;
pub use http_connection::BoxedWriter;
pub use http_connection::ConnectionConfig;
pub use http_connection::HttpConnection;
pub use response_writer::ResponseWriter;
