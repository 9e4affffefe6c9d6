use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// The error type application handlers return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Startup and configuration failures, reported to the caller of [`Server::start`](crate::Server::start).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("can't resolve address {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("can't listen on {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("can't build the runtime: {source}")]
    Runtime {
        #[source]
        source: io::Error,
    },

    #[error("server is already running")]
    AlreadyRunning,

    #[error("invalid static route pattern {pattern}: {source}")]
    InvalidRoute {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
