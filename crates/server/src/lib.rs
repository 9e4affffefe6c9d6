//! An embeddable HTTP/1.1 server engine
//!
//! `portico` binds a TCP port, serves static files from configured directories and hands
//! every other request to one pluggable [`Application`]. Connections are driven by
//! [`portico_http`], one request/response cycle at a time with keep-alive.
//!
//! # Features
//!
//! - Static routes matched by case-insensitive regular expressions, first match wins
//! - `Last-Modified`/`If-Modified-Since`, single byte ranges and gzip for compressible types
//! - Path traversal protection through canonical path containment
//! - Streaming application responses, chunked when no `Content-Length` is given
//! - Optional serialization of application invocations
//! - Graceful stop from any thread, or on SIGINT, SIGTERM and SIGQUIT
//!
//! # Example
//!
//! ```no_run
//! use http::StatusCode;
//! use portico::{AppResponse, Server, app_fn};
//!
//! fn main() -> Result<(), portico::ServerError> {
//!     let server = Server::builder()
//!         .address("127.0.0.1")
//!         .port(8000)
//!         .num_threads(4)
//!         .static_route("^/static/", "./public")
//!         .application(app_fn(|request, body| async move {
//!             let text = format!("{} {} with {} body bytes\n", request.method(), request.path(), body.len());
//!             Ok(AppResponse::text(StatusCode::OK, text))
//!         }))
//!         .build()?;
//!
//!     // blocks until ctrl-c or `server.handle().stop()`
//!     server.start()
//! }
//! ```

mod app;
mod config;
mod error;
mod mime;
mod router;
mod server;
mod static_files;

pub use app::{
    AppContext, AppFn, AppResponse, Application, BodyStream, InvalidStatusLine, RequestInfo, SerializationPolicy, StatusLine, app_fn,
};
pub use config::ServerConfig;
pub use error::{BoxError, ServerError};
pub use mime::MimeTable;
pub use router::{Router, StaticRoute};
pub use server::{Server, ServerBuilder, ServerHandle};
pub use static_files::StaticFiles;
