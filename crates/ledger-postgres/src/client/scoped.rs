//! Scoped execution wrappers for queries and commands.
//!
//! Domain operations never touch the pool directly. They hand a closure to
//! [`PgClient::with_query`] or [`PgClient::with_command`]; the wrapper acquires
//! a connection, runs the closure with a scoped borrow of it, and returns the
//! connection to the pool when the closure finishes. Queries run in autocommit
//! mode; commands run inside a transaction that commits on success and rolls
//! back on any error.

use diesel_async::scoped_futures::ScopedBoxFuture;
use diesel_async::{AnsiTransactionManager, TransactionManager};

use crate::{PgClient, PgError, PooledConnection, TRACING_TARGET_SCOPED};

impl PgClient {
    /// Executes the given function with a scoped autocommitting connection.
    ///
    /// Each statement issued by the closure commits on its own. The closure
    /// must not call another wrapper on the same client; nested wrapped calls
    /// acquire a second connection and can deadlock a saturated pool.
    ///
    /// Acquisition failures surface through the closure's error type via its
    /// `From<PgError>` conversion; driver errors raised inside the closure are
    /// the closure's own to translate.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let row = client
    ///     .with_query(|conn| {
    ///         async move { items.load(conn).await.map_err(PgError::from) }.scope_boxed()
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_query<'a, T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: for<'r> FnOnce(&'r mut PooledConnection) -> ScopedBoxFuture<'a, 'r, Result<T, E>>
            + Send
            + 'a,
        T: Send + 'a,
        E: From<PgError> + Send + 'a,
    {
        let mut conn = self.get_connection().await.map_err(E::from)?;

        tracing::debug!(target: TRACING_TARGET_SCOPED, mode = "query", "Executing scoped query");
        let result = f(&mut conn).await;

        if result.is_err() {
            tracing::debug!(target: TRACING_TARGET_SCOPED, mode = "query", "Scoped query returned an error");
        }

        result
    }

    /// Executes the given function within a database transaction.
    ///
    /// A transaction is opened on the scoped connection before the closure
    /// runs. If the closure returns `Ok`, the transaction is committed; on any
    /// `Err` it is rolled back and the closure's error is returned unchanged.
    /// Failures while beginning, committing, or rolling back surface as
    /// [`PgError::Transaction`] through the closure's `From<PgError>`
    /// conversion; statement failures inside the closure should be translated
    /// with the same variant so logs tell them apart from read-path failures.
    /// A rollback failure is logged but never replaces the error that
    /// triggered the rollback.
    ///
    /// The same nesting rule as [`PgClient::with_query`] applies: do not call
    /// another wrapper from inside the closure.
    ///
    /// # Example
    ///
    /// ```ignore
    /// client
    ///     .with_command(|conn| {
    ///         async move {
    ///             diesel::insert_into(items)
    ///                 .values(&row)
    ///                 .execute(conn)
    ///                 .await
    ///                 .map_err(PgError::Transaction)?;
    ///             Ok(())
    ///         }
    ///         .scope_boxed()
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_command<'a, T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: for<'r> FnOnce(&'r mut PooledConnection) -> ScopedBoxFuture<'a, 'r, Result<T, E>>
            + Send
            + 'a,
        T: Send + 'a,
        E: From<PgError> + Send + 'a,
    {
        let mut conn = self.get_connection().await.map_err(E::from)?;

        AnsiTransactionManager::begin_transaction(&mut *conn)
            .await
            .map_err(|e| {
                tracing::error!(target: TRACING_TARGET_SCOPED, error = %e, "Failed to begin transaction");
                E::from(PgError::Transaction(e))
            })?;

        tracing::debug!(target: TRACING_TARGET_SCOPED, mode = "command", "Executing scoped command");

        match f(&mut conn).await {
            Ok(value) => {
                AnsiTransactionManager::commit_transaction(&mut *conn)
                    .await
                    .map_err(|e| {
                        tracing::error!(target: TRACING_TARGET_SCOPED, error = %e, "Failed to commit transaction");
                        E::from(PgError::Transaction(e))
                    })?;

                tracing::debug!(target: TRACING_TARGET_SCOPED, mode = "command", "Transaction committed");
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback_error) =
                    AnsiTransactionManager::rollback_transaction(&mut *conn).await
                {
                    // The original error stays; the failed rollback is only recorded.
                    tracing::error!(
                        target: TRACING_TARGET_SCOPED,
                        error = %rollback_error,
                        "Failed to roll back transaction"
                    );
                } else {
                    tracing::debug!(target: TRACING_TARGET_SCOPED, mode = "command", "Transaction rolled back");
                }

                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use diesel_async::scoped_futures::ScopedFutureExt;

    use crate::{PgConfig, PgError};

    #[tokio::test]
    async fn test_query_closure_skipped_when_acquisition_fails() {
        let client = PgConfig::new("localhost", "ledger")
            .build()
            .expect("valid configuration");
        client.close();

        let ran = Arc::new(AtomicBool::new(false));
        let observed = Arc::clone(&ran);

        let result: Result<(), PgError> = client
            .with_query(move |_conn| {
                observed.store(true, Ordering::SeqCst);
                async move { Ok(()) }.scope_boxed()
            })
            .await;

        assert!(matches!(result, Err(PgError::Closed(None))));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_command_surfaces_acquisition_error_through_caller_type() {
        #[derive(Debug)]
        enum AppError {
            Db(PgError),
        }

        impl From<PgError> for AppError {
            fn from(error: PgError) -> Self {
                Self::Db(error)
            }
        }

        let client = PgConfig::new("localhost", "ledger")
            .build()
            .expect("valid configuration");
        client.close();

        let result: Result<(), AppError> = client
            .with_command(|_conn| async move { Ok(()) }.scope_boxed())
            .await;

        assert!(matches!(result, Err(AppError::Db(PgError::Closed(None)))));
    }
}
