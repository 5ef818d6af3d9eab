//! Error types and utilities for database operations.
//!
//! Every driver-level failure (connection, pooling, query, transaction) is
//! translated into the single [`PgError`] type at the wrapper boundary, so no
//! caller above this layer needs to handle driver-specific error types. The
//! [`PgError::context`] map exposes the underlying diagnostics in a structured
//! form that the surrounding layers can log or surface without parsing free text.

use std::borrow::Cow;

pub use deadpool::managed::TimeoutType;
use diesel::result::{ConnectionError, DatabaseErrorKind, Error};
use diesel_async::pooled_connection::PoolError as DieselPoolError;
use diesel_async::pooled_connection::deadpool::PoolError as DeadpoolError;
use serde_json::{Map, Value, json};

use crate::client::ReconnectContext;

/// Type-erased error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Comprehensive error type for all PostgreSQL database operations.
///
/// This enum covers every error condition the connection layer can produce:
/// configuration problems, pool saturation and timeouts, connection failures,
/// the reconnection fail-fast path, and query or transaction failures.
#[derive(Debug, thiserror::Error)]
#[must_use = "database errors should be handled appropriately"]
pub enum PgError {
    /// Configuration error.
    ///
    /// This includes invalid configuration parameters, missing required settings,
    /// or an uninitialized shared client. Fatal: no database access is possible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database operation timed out.
    ///
    /// This can occur while waiting for an available connection, creating a new
    /// connection, or recycling an idle one.
    #[error("Database operation timed out")]
    Timeout(TimeoutType),

    /// Too many callers are already waiting for a connection.
    ///
    /// Raised before entering the wait queue when the configured `max_waiting`
    /// bound is reached. Recoverable: the caller may retry later.
    #[error("Connection pool saturated: {waiting} callers waiting (limit {max_waiting})")]
    Saturated {
        /// Number of callers currently waiting for a connection.
        waiting: usize,
        /// Configured maximum number of waiting callers.
        max_waiting: usize,
    },

    /// Failed to establish or maintain a database connection.
    ///
    /// This includes authentication failures, network issues, and invalid
    /// connection parameters.
    #[error("Database connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The pool could not re-establish a lost backend connection.
    ///
    /// The pool has been closed as part of raising this error; no further
    /// connections will be handed out until a fresh client is installed.
    #[error("Database reconnection error: {0}")]
    Reconnect(ReconnectContext),

    /// The pool is closed and refuses new acquisitions.
    ///
    /// Carries the reconnection failure that closed the pool, if any.
    #[error("Connection pool is closed")]
    Closed(Option<ReconnectContext>),

    /// Database query execution failed on the autocommitting query path.
    ///
    /// This includes SQL syntax errors, constraint violations, type mismatches,
    /// and other query-related failures.
    #[error("Database exception during query execution: {0}")]
    Query(#[from] Error),

    /// Database failure on the transactional command path.
    ///
    /// Raised for driver errors while beginning, committing, or rolling back a
    /// transaction, distinct from [`PgError::Query`] so callers and logs can tell
    /// transactional failures from read-path failures.
    #[error("Database exception during transaction: {0}")]
    Transaction(Error),

    /// Database migration operation failed.
    #[error("Database migration error: {0}")]
    Migration(BoxError),

    /// Unexpected error occurred.
    ///
    /// This can occur when an error is encountered that is not covered by the
    /// other error types.
    #[error("Unexpected error: {0}")]
    Unexpected(Cow<'static, str>),
}

impl PgError {
    /// Returns the error kind as a short string for categorization.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Timeout(_) => "timeout",
            Self::Saturated { .. } => "saturated",
            Self::Connection(_) => "connection",
            Self::Reconnect(_) => "reconnect",
            Self::Closed(_) => "closed",
            Self::Query(_) => "query",
            Self::Transaction(_) => "transaction",
            Self::Migration(_) => "migration",
            Self::Unexpected(_) => "unexpected",
        }
    }

    /// Returns the structured diagnostic context for this error.
    ///
    /// The map always contains `kind` and `message`; variant-specific keys carry
    /// the driver's diagnostic payload (database error details, pool counters,
    /// the recorded reconnection failure). Consumers can log or serialize the
    /// map without parsing the display string.
    pub fn context(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("kind".to_owned(), json!(self.kind()));
        map.insert("message".to_owned(), json!(self.to_string()));

        match self {
            Self::Timeout(timeout) => {
                map.insert("timeout".to_owned(), json!(format!("{timeout:?}")));
            }
            Self::Saturated {
                waiting,
                max_waiting,
            } => {
                map.insert("waiting".to_owned(), json!(waiting));
                map.insert("max_waiting".to_owned(), json!(max_waiting));
            }
            Self::Reconnect(context) | Self::Closed(Some(context)) => {
                map.insert("cause".to_owned(), json!(context.cause));
            }
            Self::Query(error) | Self::Transaction(error) => {
                insert_diagnostics(&mut map, error);
            }
            _ => {}
        }

        map
    }

    /// Extracts the constraint name from a constraint violation error.
    ///
    /// # Returns
    ///
    /// - `Some(constraint_name)` if this error represents a constraint violation
    /// - `None` if this error is not related to a constraint violation
    pub fn constraint(&self) -> Option<&str> {
        let (Self::Query(err) | Self::Transaction(err)) = self else {
            return None;
        };

        let Error::DatabaseError(_, err) = err else {
            return None;
        };

        err.constraint_name()
    }

    /// Returns whether this error indicates a missing row.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Query(Error::NotFound) | Self::Transaction(Error::NotFound)
        )
    }

    /// Returns whether this error indicates a transient failure that might succeed on retry.
    ///
    /// Transient errors include timeouts, pool saturation, and connection issues
    /// that may be resolved by retrying the operation.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_)
                | Self::Saturated { .. }
                | Self::Connection(ConnectionError::BadConnection(_))
        )
    }

    /// Returns whether this error indicates a permanent failure that won't succeed on retry.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// Copies the driver's diagnostic payload into the context map.
fn insert_diagnostics(map: &mut Map<String, Value>, error: &Error) {
    let Error::DatabaseError(kind, info) = error else {
        map.insert("detail".to_owned(), json!(error.to_string()));
        return;
    };

    map.insert("db_error_kind".to_owned(), json!(database_error_kind(kind)));
    map.insert("db_message".to_owned(), json!(info.message()));
    if let Some(details) = info.details() {
        map.insert("details".to_owned(), json!(details));
    }
    if let Some(hint) = info.hint() {
        map.insert("hint".to_owned(), json!(hint));
    }
    if let Some(table) = info.table_name() {
        map.insert("table".to_owned(), json!(table));
    }
    if let Some(column) = info.column_name() {
        map.insert("column".to_owned(), json!(column));
    }
    if let Some(constraint) = info.constraint_name() {
        map.insert("constraint".to_owned(), json!(constraint));
    }
}

fn database_error_kind(kind: &DatabaseErrorKind) -> &'static str {
    match kind {
        DatabaseErrorKind::UniqueViolation => "unique_violation",
        DatabaseErrorKind::ForeignKeyViolation => "foreign_key_violation",
        DatabaseErrorKind::UnableToSendCommand => "unable_to_send_command",
        DatabaseErrorKind::SerializationFailure => "serialization_failure",
        DatabaseErrorKind::ReadOnlyTransaction => "read_only_transaction",
        DatabaseErrorKind::NotNullViolation => "not_null_violation",
        DatabaseErrorKind::CheckViolation => "check_violation",
        DatabaseErrorKind::ClosedConnection => "closed_connection",
        _ => "unknown",
    }
}

impl From<DeadpoolError> for PgError {
    fn from(value: DeadpoolError) -> Self {
        match value {
            DeadpoolError::Timeout(timeout) => Self::Timeout(timeout),
            DeadpoolError::Backend(DieselPoolError::QueryError(error)) => Self::Query(error),
            DeadpoolError::Backend(DieselPoolError::ConnectionError(error)) => {
                Self::Connection(error)
            }
            DeadpoolError::PostCreateHook(err) => {
                // This should not happen with our current hooks, but handle gracefully:
                tracing::warn!("Unexpected post-create hook error: {}", err);
                Self::Unexpected(err.to_string().into())
            }
            DeadpoolError::NoRuntimeSpecified => {
                // This should not happen as we specify tokio runtime, but handle gracefully:
                tracing::error!("No tokio runtime specified for connection pool");
                Self::Unexpected("No runtime specified".into())
            }
            DeadpoolError::Closed => Self::Closed(None),
        }
    }
}

/// Specialized [`Result`] type for database operations.
///
/// This is a convenience alias that uses [`PgError`] as the error type,
/// making database operation signatures cleaner and more consistent.
pub type PgResult<T, E = PgError> = Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_context_carries_diagnostics() {
        let error = PgError::Query(Error::NotFound);
        let context = error.context();

        assert_eq!(context["kind"], json!("query"));
        assert!(
            context["message"]
                .as_str()
                .unwrap()
                .contains("query execution")
        );
        assert!(error.is_not_found());
    }

    #[test]
    fn test_transaction_error_is_distinct_from_query() {
        let query = PgError::Query(Error::RollbackTransaction);
        let command = PgError::Transaction(Error::RollbackTransaction);

        assert_ne!(query.to_string(), command.to_string());
        assert!(command.to_string().contains("during transaction"));
        assert_eq!(command.kind(), "transaction");
    }

    #[test]
    fn test_saturated_context_carries_pool_counters() {
        let error = PgError::Saturated {
            waiting: 7,
            max_waiting: 5,
        };
        let context = error.context();

        assert_eq!(context["waiting"], json!(7));
        assert_eq!(context["max_waiting"], json!(5));
        assert!(error.is_transient());
    }

    #[test]
    fn test_reconnect_context_preserves_cause() {
        let reconnect = PgError::Reconnect(ReconnectContext::new("backend vanished"));
        assert_eq!(reconnect.context()["cause"], json!("backend vanished"));

        let closed = PgError::Closed(Some(ReconnectContext::new("backend vanished")));
        assert_eq!(closed.context()["cause"], json!("backend vanished"));
    }

    #[test]
    fn test_deadpool_closed_translates_to_closed() {
        let error = PgError::from(DeadpoolError::Closed);
        assert!(matches!(error, PgError::Closed(None)));
    }

    #[test]
    fn test_timeout_is_transient_config_is_not() {
        assert!(PgError::Timeout(TimeoutType::Wait).is_transient());
        assert!(PgError::Config("bad".to_owned()).is_permanent());
    }
}
