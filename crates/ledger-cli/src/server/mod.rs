//! HTTP server startup with graceful shutdown.

mod shutdown;

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use ledger_postgres::shared;
use shutdown::wait_for_signal;
use tokio::net::TcpListener;

use crate::config::ServerConfig;

/// Tracing target for server startup events.
pub const TRACING_TARGET_STARTUP: &str = "ledger_cli::server::startup";

/// Tracing target for server shutdown events.
pub const TRACING_TARGET_SHUTDOWN: &str = "ledger_cli::server::shutdown";

/// Binds to the configured address and serves the application.
///
/// Returns once a shutdown signal has been received and in-flight requests
/// have drained. The shared database pool is closed as part of the shutdown
/// path, so no caller has to remember the teardown.
///
/// # Errors
///
/// Returns an error if:
/// - Cannot bind to the configured address/port
/// - The server encounters a fatal error during operation
pub async fn serve(app: Router, config: ServerConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        addr = %addr,
        "Server is ready and listening for connections"
    );

    if config.is_wildcard_bind() {
        tracing::warn!(
            target: TRACING_TARGET_STARTUP,
            "Server is bound to all interfaces. Ensure firewall rules are properly configured."
        );
    }

    let grace = config.shutdown_grace();
    let shutdown = async move {
        wait_for_signal().await;
        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            grace_secs = grace.as_secs(),
            "Draining in-flight requests"
        );
    };

    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("server encountered a fatal error");

    shared::close();
    result?;

    tracing::info!(target: TRACING_TARGET_SHUTDOWN, "Server shut down gracefully");
    Ok(())
}
