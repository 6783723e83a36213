//! Listener lifecycle.

use std::future::{Future, IntoFuture};

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

/// Serve `app` on `listener` until `shutdown` resolves.
///
/// In-flight requests are dropped on shutdown, not drained; dropped
/// conversions kill their child process.
pub async fn run<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Gateway listening");
    }

    tokio::select! {
        result = axum::serve(listener, app).into_future() => result,
        _ = shutdown => {
            info!("Shutdown signal received, exiting");
            Ok(())
        }
    }
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
