use std::time::Duration;

use portico_http::codec::MAX_HEADER_BYTES;

/// Process-wide server settings, fixed once the server is built.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub(crate) address: String,
    pub(crate) port: u16,
    pub(crate) num_threads: usize,
    pub(crate) header_timeout: Duration,
    pub(crate) content_timeout: Duration,
    pub(crate) reuse_address: bool,
    pub(crate) url_scheme: String,
    pub(crate) host_name: Option<String>,
    pub(crate) use_gzip: bool,
    pub(crate) handle_signals: bool,
    pub(crate) shutdown_timeout: Duration,
    pub(crate) max_header_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8000,
            num_threads: 1,
            header_timeout: Duration::from_secs(5),
            content_timeout: Duration::from_secs(300),
            reuse_address: true,
            url_scheme: "http".to_string(),
            host_name: None,
            use_gzip: true,
            handle_signals: true,
            shutdown_timeout: Duration::from_secs(1),
            max_header_bytes: MAX_HEADER_BYTES,
        }
    }
}

impl ServerConfig {
    /// The address to bind; an empty string means every IPv4 interface.
    pub fn address(&self) -> &str {
        if self.address.is_empty() { "0.0.0.0" } else { &self.address }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Threads driving the reactor, the thread calling [`Server::start`](crate::Server::start) included.
    pub fn num_threads(&self) -> usize {
        self.num_threads.max(1)
    }

    /// Deadline for a complete request header block.
    pub fn header_timeout(&self) -> Duration {
        self.header_timeout
    }

    /// Deadline for each request body read and each response write.
    pub fn content_timeout(&self) -> Duration {
        self.content_timeout
    }

    pub fn reuse_address(&self) -> bool {
        self.reuse_address
    }

    pub fn url_scheme(&self) -> &str {
        &self.url_scheme
    }

    /// The server name reported to applications, the connection's local IP when unset.
    pub fn host_name(&self) -> Option<&str> {
        self.host_name.as_deref()
    }

    pub fn use_gzip(&self) -> bool {
        self.use_gzip
    }

    pub fn handle_signals(&self) -> bool {
        self.handle_signals
    }

    /// How long [`Server::start`](crate::Server::start) waits for in-flight work after a stop.
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn max_header_bytes(&self) -> usize {
        self.max_header_bytes
    }
}
