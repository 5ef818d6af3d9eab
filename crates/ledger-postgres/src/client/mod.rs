//! PostgreSQL client with connection pooling and scoped execution.
//!
//! This module provides the high-level interface for connecting to PostgreSQL:
//! pool construction and bookkeeping, the scoped query/command wrappers, the
//! process-wide shared handle, and embedded migration management.

pub(crate) mod custom_hooks;
mod migrate;
mod pg_client;
mod pg_config;
mod pool_status;
mod scoped;
pub mod shared;

use deadpool::managed::{Object, Pool};
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
pub use migrate::{MigrationReport, PgClientExt, revert_all_migrations, run_pending_migrations};
pub use pg_client::{PgClient, ReconnectContext};
pub use pg_config::{PgConfig, PgPoolConfig};
pub use pool_status::PoolStatus;

/// Type alias for the connection pool used throughout the application.
pub type ConnectionPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Type alias for a connection object from the pool.
///
/// This is the scoped cursor handed to wrapped operations: it is owned by one
/// wrapped call for its duration and returns to the pool when dropped.
pub type PooledConnection = Object<AsyncDieselConnectionManager<AsyncPgConnection>>;
