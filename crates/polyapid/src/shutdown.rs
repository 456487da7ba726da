//! Termination signal handling for the HTTP server.

use std::future;

use tokio::signal;
use tracing::{error, info};

/// Tracing target for shutdown handling.
const SHUTDOWN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::shutdown");

/// Resolves on `SIGINT` or, on Unix, `SIGTERM`.
///
/// A listener that cannot be installed is logged and never fires.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(source) = signal::ctrl_c().await {
            error!(target: SHUTDOWN_TARGET, error = %source, "failed to listen for SIGINT");
            future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(source) => {
                error!(target: SHUTDOWN_TARGET, error = %source, "failed to listen for SIGTERM");
                future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        () = interrupt => info!(target: SHUTDOWN_TARGET, signal = "SIGINT", "shutdown signal received"),
        () = terminate => info!(target: SHUTDOWN_TARGET, signal = "SIGTERM", "shutdown signal received"),
    }
}
