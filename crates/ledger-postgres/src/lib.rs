#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Embeds all migrations into the final binary.
pub(crate) const MIGRATIONS: diesel_migrations::EmbeddedMigrations =
    diesel_migrations::embed_migrations!();

// Tracing target constants for consistent logging.

/// Tracing target for client-related operations.
///
/// Use this target for logging client initialization, configuration, and lifecycle events.
pub const TRACING_TARGET_CLIENT: &str = "ledger_postgres::client";

/// Tracing target for scoped query and command execution.
///
/// Use this target for logging wrapped operation execution, commits, and rollbacks.
pub const TRACING_TARGET_SCOPED: &str = "ledger_postgres::scoped";

/// Tracing target for database migration operations.
///
/// Use this target for logging migration application, rollback, and migration status checks.
pub const TRACING_TARGET_MIGRATION: &str = "ledger_postgres::migrations";

/// Tracing target for database connection operations.
///
/// Use this target for logging connection establishment, pool management, and connection errors.
pub const TRACING_TARGET_CONNECTION: &str = "ledger_postgres::connection";

mod client;
mod error;

pub use diesel_async::AsyncPgConnection as PgConnection;

pub use crate::client::{
    ConnectionPool, MigrationReport, PgClient, PgClientExt, PgConfig, PgPoolConfig, PoolStatus,
    PooledConnection, ReconnectContext, run_pending_migrations, revert_all_migrations, shared,
};
pub use crate::error::{BoxError, PgError, PgResult, TimeoutType};
