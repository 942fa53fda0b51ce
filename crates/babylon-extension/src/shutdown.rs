//! Graceful shutdown handling for the extension server.

use tokio_util::sync::CancellationToken;

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!(category = "server", "Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!(category = "server", "Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Cancel `token` once a shutdown signal arrives.
///
/// Returns immediately if the token is cancelled some other way first.
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        _ = shutdown_signal() => token.cancel(),
        _ = token.cancelled() => {}
    }
}
