//! Shutdown signal handling for the server process.

use super::TRACING_TARGET_SHUTDOWN;

/// Resolves once the process receives SIGTERM or SIGINT (Ctrl+C).
///
/// If a handler cannot be installed, the failure is logged and that signal is
/// treated as never arriving; the server keeps running rather than shutting
/// down spuriously.
pub async fn wait_for_signal() {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!(
                    target: TRACING_TARGET_SHUTDOWN,
                    signal = "SIGINT",
                    "Shutdown signal received"
                );
            }
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET_SHUTDOWN,
                    error = %error,
                    "Failed to install SIGINT handler"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!(
                    target: TRACING_TARGET_SHUTDOWN,
                    signal = "SIGTERM",
                    "Shutdown signal received"
                );
            }
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET_SHUTDOWN,
                    error = %error,
                    "Failed to install SIGTERM handler"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }
}
