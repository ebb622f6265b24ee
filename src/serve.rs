//! HTTP listener with graceful shutdown.

use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};

/// Bind the listener and serve until SIGINT/SIGTERM.
pub async fn serve<S: ToSocketAddrs>(addr: S, router: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Listening on http://{}", addr);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
