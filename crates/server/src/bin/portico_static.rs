//! Serves a directory over HTTP: `portico-static [root] [port] [threads]`.

use std::process::ExitCode;

use portico::Server;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

fn main() -> ExitCode {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut args = std::env::args().skip(1);
    let root = args.next().unwrap_or_else(|| ".".to_string());
    let port = match args.next().map(|port| port.parse::<u16>()).transpose() {
        Ok(port) => port.unwrap_or(8000),
        Err(e) => {
            error!(cause = %e, "invalid port");
            return ExitCode::FAILURE;
        }
    };
    let threads = match args.next().map(|threads| threads.parse::<usize>()).transpose() {
        Ok(threads) => threads.unwrap_or(1),
        Err(e) => {
            error!(cause = %e, "invalid thread count");
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::builder().port(port).num_threads(threads).static_route("^/", &root).build() {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(%root, port, threads, "serving directory");
    match server.start() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(cause = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}
