use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use http::HeaderValue;
use portico_http::connection::{ConnectionConfig, HttpConnection, ResponseWriter};
use portico_http::handler::Handler;
use portico_http::protocol::{HttpError, PeerInfo, Request};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::app::{AppAdapter, Application, SerializationPolicy};
use crate::config::ServerConfig;
use crate::mime::MimeTable;
use crate::router::{Router, StaticRoute};
use crate::static_files::StaticFiles;
use crate::ServerError;

const SERVER_NAME: &str = concat!("portico/", env!("CARGO_PKG_VERSION"));
const LISTEN_BACKLOG: u32 = 1024;

pub struct ServerBuilder {
    config: ServerConfig,
    routes: Vec<(String, PathBuf)>,
    application: Option<Arc<dyn Application>>,
    policy: SerializationPolicy,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { config: ServerConfig::default(), routes: Vec::new(), application: None, policy: SerializationPolicy::default() }
    }

    /// The address to bind, `0.0.0.0` by default.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    /// The port to bind, `0` picks a free one.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.config.num_threads = num_threads.max(1);
        self
    }

    pub fn header_timeout(mut self, timeout: Duration) -> Self {
        self.config.header_timeout = timeout;
        self
    }

    pub fn content_timeout(mut self, timeout: Duration) -> Self {
        self.config.content_timeout = timeout;
        self
    }

    pub fn reuse_address(mut self, reuse_address: bool) -> Self {
        self.config.reuse_address = reuse_address;
        self
    }

    pub fn url_scheme(mut self, url_scheme: impl Into<String>) -> Self {
        self.config.url_scheme = url_scheme.into();
        self
    }

    pub fn host_name(mut self, host_name: impl Into<String>) -> Self {
        self.config.host_name = Some(host_name.into());
        self
    }

    pub fn use_gzip(mut self, use_gzip: bool) -> Self {
        self.config.use_gzip = use_gzip;
        self
    }

    /// Whether SIGINT, SIGTERM and SIGQUIT stop the server.
    pub fn handle_signals(mut self, handle_signals: bool) -> Self {
        self.config.handle_signals = handle_signals;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    pub fn max_header_bytes(mut self, max_header_bytes: usize) -> Self {
        self.config.max_header_bytes = max_header_bytes;
        self
    }

    /// Serves `content_dir` for paths matching `pattern`; routes are tried in the order added.
    pub fn static_route(mut self, pattern: impl Into<String>, content_dir: impl Into<PathBuf>) -> Self {
        self.routes.push((pattern.into(), content_dir.into()));
        self
    }

    pub fn application(mut self, application: impl Application + 'static) -> Self {
        self.application = Some(Arc::new(application));
        self
    }

    pub fn serialization_policy(mut self, policy: SerializationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Result<Server, ServerError> {
        let mut server = Server::with_config(self.config);
        for (pattern, content_dir) in self.routes {
            server.add_static_route(&pattern, content_dir)?;
        }
        server.application = self.application;
        server.policy = self.policy;
        Ok(server)
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder").field("config", &self.config).field("routes", &self.routes).finish_non_exhaustive()
    }
}

/// State shared between a running server and its handles.
#[derive(Debug, Default)]
struct Control {
    running: AtomicBool,
    shutdown: Mutex<Option<Arc<Notify>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Control {
    fn shutdown(&self) -> MutexGuard<'_, Option<Arc<Notify>>> {
        self.shutdown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn local_addr(&self) -> MutexGuard<'_, Option<SocketAddr>> {
        self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Stops a server from another thread or task.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    control: Arc<Control>,
}

impl ServerHandle {
    /// Closes the acceptor and ends [`Server::start`]. A no-op when not running.
    ///
    /// Safe to call from any thread or task, but not from a raw signal handler: it takes a
    /// lock and wakes a task. Use [`handle_signals`](crate::ServerBuilder::handle_signals), or
    /// forward the signal through a tokio signal stream, instead.
    pub fn stop(&self) {
        if let Some(shutdown) = self.control.shutdown().as_ref() {
            info!("stopping server");
            shutdown.notify_one();
        }
    }

    pub fn is_running(&self) -> bool {
        self.control.running.load(Ordering::SeqCst)
    }

    /// The bound address while the server is listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.control.local_addr()
    }
}

/// The embeddable HTTP/1.1 server: static routes first, everything else to the application.
pub struct Server {
    config: ServerConfig,
    router: Router,
    mime_table: Arc<MimeTable>,
    application: Option<Arc<dyn Application>>,
    policy: SerializationPolicy,
    control: Arc<Control>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// A server for `address:port` driven by `num_threads` threads, other settings at their defaults.
    pub fn new(address: impl Into<String>, port: u16, num_threads: usize) -> Self {
        let config = ServerConfig { address: address.into(), port, num_threads: num_threads.max(1), ..ServerConfig::default() };
        Self::with_config(config)
    }

    fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            mime_table: Arc::new(MimeTable::new()),
            application: None,
            policy: SerializationPolicy::default(),
            control: Arc::new(Control::default()),
        }
    }

    /// Appends a static route. Routes must be configured before [`start`](Self::start).
    pub fn add_static_route(&mut self, pattern: &str, content_dir: impl Into<PathBuf>) -> Result<(), ServerError> {
        self.router.add(StaticRoute::new(pattern, content_dir)?);
        Ok(())
    }

    pub fn set_app(&mut self, application: impl Application + 'static) {
        self.application = Some(Arc::new(application));
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle { control: Arc::clone(&self.control) }
    }

    pub fn is_running(&self) -> bool {
        self.handle().is_running()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.handle().local_addr()
    }

    pub fn stop(&self) {
        self.handle().stop();
    }

    /// Binds, accepts and serves until [`stop`](Self::stop) is called.
    ///
    /// Blocks the calling thread, which runs only the accept loop while `num_threads - 1`
    /// worker threads serve the connections (a single thread does both). Returns once the
    /// workers are shut down; in-flight connections get `shutdown_timeout` to finish. Calling
    /// it again after it returned starts a fresh reactor.
    pub fn start(&self) -> Result<(), ServerError> {
        let shutdown = {
            let mut slot = self.control.shutdown();
            if self.control.running.swap(true, Ordering::SeqCst) {
                return Err(ServerError::AlreadyRunning);
            }
            let shutdown = Arc::new(Notify::new());
            *slot = Some(Arc::clone(&shutdown));
            shutdown
        };

        let result = self.run(shutdown);

        let mut slot = self.control.shutdown();
        *slot = None;
        *self.control.local_addr() = None;
        self.control.running.store(false, Ordering::SeqCst);
        result
    }

    fn run(&self, shutdown: Arc<Notify>) -> Result<(), ServerError> {
        let runtime = build_runtime(self.config.num_threads())?;
        let result = runtime.block_on(self.serve(shutdown));
        runtime.shutdown_timeout(self.config.shutdown_timeout());
        info!("server stopped");
        result
    }

    async fn serve(&self, shutdown: Arc<Notify>) -> Result<(), ServerError> {
        let listener = listen(&self.config).await?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind { address: SocketAddr::from(([0, 0, 0, 0], self.config.port())), source })?;
        *self.control.local_addr() = Some(local_addr);
        info!(%local_addr, threads = self.config.num_threads(), routes = self.router.len(), "server started");

        if self.config.handle_signals() {
            tokio::spawn(stop_on_signal(self.handle()));
        }

        let dispatcher = Arc::new(Dispatcher {
            router: self.router.clone(),
            static_files: StaticFiles::new(Arc::clone(&self.mime_table), self.config.use_gzip()),
            app: AppAdapter::new(self.application.clone(), self.policy, self.config.url_scheme().to_string(), self.config.host_name.clone()),
        });
        let connection_config = ConnectionConfig {
            header_timeout: self.config.header_timeout(),
            content_timeout: self.config.content_timeout(),
            max_header_bytes: self.config.max_header_bytes(),
            server: Some(HeaderValue::from_static(SERVER_NAME)),
        };

        loop {
            tokio::select! {
                biased;
                () = shutdown.notified() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        spawn_connection(stream, remote, local_addr, Arc::clone(&dispatcher), connection_config.clone());
                    }
                    Err(e) => warn!(cause = %e, "failed to accept"),
                },
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("router", &self.router)
            .field("policy", &self.policy)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Routes each request to the static files or the application.
#[derive(Debug)]
struct Dispatcher {
    router: Router,
    static_files: StaticFiles,
    app: AppAdapter,
}

#[async_trait]
impl Handler for Dispatcher {
    async fn call(&self, request: &mut Request<'_>, writer: &mut ResponseWriter<'_>) -> Result<(), HttpError> {
        match self.router.route(request.header().path()) {
            Some(route) => self.static_files.serve(request, route, writer).await,
            None => self.app.serve(request, writer).await,
        }
    }
}

fn spawn_connection(stream: TcpStream, remote: SocketAddr, listening: SocketAddr, dispatcher: Arc<Dispatcher>, config: ConnectionConfig) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(remote_addr = %remote, cause = %e, "can't set nodelay");
    }
    // the listener may be bound to a wildcard address
    let peer = PeerInfo::new(remote, stream.local_addr().unwrap_or(listening));

    tokio::spawn(async move {
        let (reader, writer) = stream.into_split();
        let connection = HttpConnection::new(reader, writer, peer, config);
        match connection.process(dispatcher).await {
            Ok(()) => debug!(remote_addr = %peer.remote, "connection closed"),
            Err(e) if e.is_connection_lost() => info!(remote_addr = %peer.remote, cause = %e, "connection lost"),
            Err(e) => warn!(remote_addr = %peer.remote, cause = %e, "connection closed with error"),
        }
    });
}

fn build_runtime(num_threads: usize) -> Result<Runtime, ServerError> {
    let mut builder = if num_threads > 1 { Builder::new_multi_thread() } else { Builder::new_current_thread() };
    if num_threads > 1 {
        builder.worker_threads(num_threads - 1);
    }
    builder.enable_all().thread_name("portico-worker").build().map_err(|source| ServerError::Runtime { source })
}

async fn listen(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let host = config.address();
    let resolve_error = |source| ServerError::Resolve { address: format!("{host}:{}", config.port()), source };
    let addresses = tokio::net::lookup_host((host, config.port())).await.map_err(resolve_error)?;

    let mut failure = None;
    for address in addresses {
        match bind(address, config.reuse_address()) {
            Ok(listener) => return Ok(listener),
            Err(source) => {
                debug!(%address, cause = %source, "bind failed");
                failure = Some(ServerError::Bind { address, source });
            }
        }
    }
    Err(failure.unwrap_or_else(|| resolve_error(io::Error::new(io::ErrorKind::NotFound, "no address found"))))
}

fn bind(address: SocketAddr, reuse_address: bool) -> io::Result<TcpListener> {
    let socket = if address.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
    socket.set_reuseaddr(reuse_address)?;
    socket.bind(address)?;
    socket.listen(LISTEN_BACKLOG)
}

async fn stop_on_signal(handle: ServerHandle) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = signal(SignalKind::terminate())?;
        let mut quit = signal(SignalKind::quit())?;
        tokio::select! {
            _ = terminate.recv() => Ok::<_, io::Error>("SIGTERM"),
            _ = quit.recv() => Ok("SIGQUIT"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<io::Result<&'static str>>();

    let received = tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        result = terminate => result,
    };

    match received {
        Ok(signal) => {
            info!(signal, "received signal");
            handle.stop();
        }
        Err(e) => warn!(cause = %e, "can't listen for signals"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_before_start_is_a_noop() {
        let server = Server::new("127.0.0.1", 0, 1);
        assert!(!server.is_running());
        server.stop();
        server.stop();
        assert!(!server.is_running());
        assert_eq!(server.local_addr(), None);
    }

    #[test]
    fn builder_compiles_routes() {
        let server = Server::builder().static_route("^/static/", "/srv/www").static_route("^/media/", "/srv/media").build().unwrap();
        assert_eq!(server.router().len(), 2);
        assert_eq!(server.router().routes()[1].pattern(), "^/media/");

        let err = Server::builder().static_route("^/(", "/srv").build().unwrap_err();
        assert!(matches!(err, ServerError::InvalidRoute { .. }));
    }

    #[test]
    fn bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let server = Server::builder().address("127.0.0.1").port(port).reuse_address(false).handle_signals(false).build().unwrap();
        let err = server.start().unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }), "{err}");
        assert!(!server.is_running());
    }

    #[test]
    fn unresolvable_address_is_reported() {
        let server = Server::builder().address("no such host.invalid").port(80).handle_signals(false).build().unwrap();
        let err = server.start().unwrap_err();
        assert!(matches!(err, ServerError::Resolve { .. }), "{err}");
    }
}
