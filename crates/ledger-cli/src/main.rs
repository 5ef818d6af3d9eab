#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use ledger_postgres::{PgClient, PgClientExt, PgConfig, shared};
use ledger_server::handler::routes;
use ledger_server::service::ServiceState;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Cli, log_server_config};

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "ledger_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "ledger_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "ledger_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing();
    log_startup_info();
    log_server_config(&cli.server);

    cli.server
        .validate()
        .context("invalid server configuration")?;
    cli.postgres
        .validate()
        .context("invalid database configuration")?;

    let pg = connect_with_retry(&cli.postgres).await?;
    pg.run_pending_migrations()
        .await
        .context("failed to apply database migrations")?;
    shared::install(pg).context("failed to install shared database client")?;

    let state = ServiceState::from_shared().context("failed to create service state")?;
    let router = create_router(state);

    server::serve(router, cli.server).await
}

/// Connects to the database, retrying while the backend comes up.
///
/// Deployments often start the service and the database together; a handful of
/// spaced attempts covers the window where the backend is not accepting
/// connections yet.
async fn connect_with_retry(config: &PgConfig) -> anyhow::Result<PgClient> {
    const MAX_ATTEMPTS: u32 = 10;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut attempt = 1;
    loop {
        match PgClient::connect(config.clone()).await {
            Ok(client) => return Ok(client),
            Err(error) if attempt < MAX_ATTEMPTS => {
                tracing::warn!(
                    target: TRACING_TARGET_STARTUP,
                    attempt,
                    max_attempts = MAX_ATTEMPTS,
                    error = %error,
                    "Database is not reachable yet, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
                attempt += 1;
            }
            Err(error) => {
                return Err(error).context("failed to connect to the database");
            }
        }
    }
}

/// Creates the router with request tracing applied.
fn create_router(state: ServiceState) -> Router {
    routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Initializes tracing with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Logs startup information.
fn log_startup_info() {
    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        "starting ledger server"
    );

    tracing::debug!(
        target: TRACING_TARGET_STARTUP,
        pid = process::id(),
        arch = std::env::consts::ARCH,
        os = std::env::consts::OS,
        "build information"
    );
}
