use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use deadpool::managed::{Hook, Pool};
use diesel_async::RunQueryDsl;
use diesel_async::pooled_connection::PoolError as DieselPoolError;
use diesel_async::pooled_connection::deadpool::PoolError as DeadpoolError;
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, ManagerConfig};
use futures::future::try_join_all;

use super::custom_hooks;
use crate::{
    ConnectionPool, PgConfig, PgError, PgResult, PoolStatus, PooledConnection,
    TRACING_TARGET_CONNECTION,
};

/// Diagnostic record of a failed reconnection attempt.
///
/// When the pool loses its backend and cannot establish a replacement
/// connection, the failure is recorded here and the pool is closed. Every
/// subsequent acquisition surfaces the same context, so all callers see the
/// outage rather than queueing behind a dead backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectContext {
    /// Human-readable description of the underlying connection failure.
    pub cause: String,
}

impl ReconnectContext {
    /// Creates a new reconnection context from the underlying failure.
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }
}

impl fmt::Display for ReconnectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cause)
    }
}

/// High-level database client that manages the connection pool.
///
/// The client is a cheap cloneable handle over a shared pool; clones refer to
/// the same pool and fault state. It hands out scoped connections through
/// [`PgClient::with_query`] and [`PgClient::with_command`] and refuses new
/// acquisitions once a reconnection failure has closed the pool.
///
/// [`PgClient::with_query`]: crate::PgClient::with_query
/// [`PgClient::with_command`]: crate::PgClient::with_command
#[derive(Clone)]
pub struct PgClient {
    inner: Arc<PgClientInner>,
}

/// Inner data for PgClient
struct PgClientInner {
    pool: ConnectionPool,
    config: PgConfig,
    /// Set once by the first failed reconnection; read by every acquisition.
    fault: Mutex<Option<ReconnectContext>>,
}

impl PgClient {
    /// Creates a new database client with the provided configuration.
    ///
    /// This builds the connection pool without opening any connections;
    /// connections are established on first use. Use [`PgClient::connect`] to
    /// also verify connectivity and pre-warm the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool configuration is invalid.
    #[tracing::instrument(
        skip(config),
        target = TRACING_TARGET_CONNECTION,
        fields(url = %config.url_masked())
    )]
    pub fn new(config: PgConfig) -> PgResult<Self> {
        tracing::info!(target: TRACING_TARGET_CONNECTION, "Initializing database client");

        let mut manager_config = ManagerConfig::default();
        manager_config.custom_setup = Box::new(custom_hooks::setup_callback);
        let manager = AsyncDieselConnectionManager::new_with_config(config.url(), manager_config);

        let pool = Pool::builder(manager)
            .max_size(config.pool.max_size as usize)
            .wait_timeout(Some(config.pool.acquire_timeout()))
            .create_timeout(Some(config.pool.acquire_timeout()))
            .runtime(deadpool::Runtime::Tokio1)
            .post_create(Hook::sync_fn(custom_hooks::post_create))
            .pre_recycle(Hook::sync_fn(custom_hooks::pre_recycle))
            .post_recycle(Hook::sync_fn(custom_hooks::post_recycle))
            .build()
            .map_err(|e| {
                tracing::error!(target: TRACING_TARGET_CONNECTION, error = %e, "Failed to create connection pool");
                PgError::Unexpected(format!("Failed to build connection pool: {}", e).into())
            })?;

        Ok(Self {
            inner: Arc::new(PgClientInner {
                pool,
                config,
                fault: Mutex::new(None),
            }),
        })
    }

    /// Creates a new database client and verifies connectivity.
    ///
    /// Runs a connectivity probe against the database and then opens idle
    /// connections up to the configured `min_idle`, so the first real callers
    /// do not pay connection establishment latency.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    ///
    /// - Pool configuration is invalid
    /// - The database connection cannot be established
    /// - The connectivity probe fails
    #[tracing::instrument(
        skip(config),
        target = TRACING_TARGET_CONNECTION,
        fields(url = %config.url_masked())
    )]
    pub async fn connect(config: PgConfig) -> PgResult<Self> {
        let this = Self::new(config)?;

        tracing::debug!(target: TRACING_TARGET_CONNECTION, "Testing database connectivity");

        #[derive(diesel::QueryableByName)]
        struct ConnectivityProbe {
            #[diesel(sql_type = diesel::sql_types::Integer)]
            #[allow(dead_code)]
            result: i32,
        }

        {
            let mut conn = this.get_connection().await?;
            let _: ConnectivityProbe = diesel::sql_query("SELECT 1 AS result")
                .get_result(&mut *conn)
                .await
                .map_err(|e| {
                    tracing::error!(target: TRACING_TARGET_CONNECTION, error = %e, "Database connectivity test failed");
                    PgError::from(e)
                })?;
        }

        let min_idle = this.inner.config.pool.min_idle as usize;
        if min_idle > 1 {
            // Hold all warm connections simultaneously so the pool actually
            // opens min_idle of them instead of reusing one.
            let warm = try_join_all((0..min_idle).map(|_| this.inner.pool.get()))
                .await
                .map_err(PgError::from)?;
            drop(warm);
        }

        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            min_idle = this.inner.config.pool.min_idle,
            max_size = this.inner.config.pool.max_size,
            acquire_timeout_secs = this.inner.config.pool.acquire_timeout_secs,
            "Database client initialized"
        );

        Ok(this)
    }

    /// Gets a connection from the pool.
    ///
    /// The returned [`PooledConnection`] goes back to the pool when dropped.
    /// Acquisition is refused outright when a reconnection failure has closed
    /// the pool or when the wait queue is already at its configured bound.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    ///
    /// - The pool has been closed ([`PgError::Closed`])
    /// - Too many callers are already waiting ([`PgError::Saturated`])
    /// - No connection becomes available within the timeout ([`PgError::Timeout`])
    /// - The backend cannot be reached ([`PgError::Reconnect`])
    #[tracing::instrument(skip(self), target = TRACING_TARGET_CONNECTION)]
    pub async fn get_connection(&self) -> PgResult<PooledConnection> {
        if let Some(context) = self.fault() {
            return Err(PgError::Closed(Some(context)));
        }

        if self.inner.pool.is_closed() {
            return Err(PgError::Closed(None));
        }

        let status = self.pool_status();
        let max_waiting = self.inner.config.pool.max_waiting;
        if !status.has_wait_capacity(max_waiting) {
            tracing::warn!(
                target: TRACING_TARGET_CONNECTION,
                waiting = status.waiting,
                max_waiting,
                "Refusing connection acquisition, wait queue is full"
            );
            return Err(PgError::Saturated {
                waiting: status.waiting,
                max_waiting,
            });
        }

        let start = std::time::Instant::now();
        let conn = match self.inner.pool.get().await {
            Ok(conn) => conn,
            Err(DeadpoolError::Backend(DieselPoolError::ConnectionError(cause))) => {
                return Err(self.fail_reconnect(cause));
            }
            Err(e) => {
                tracing::error!(
                    target: TRACING_TARGET_CONNECTION,
                    error = %e,
                    elapsed = ?start.elapsed(),
                    "Failed to acquire connection from pool"
                );
                return Err(PgError::from(e));
            }
        };

        let elapsed = start.elapsed();
        if elapsed > Duration::from_millis(100) {
            tracing::warn!(
                target: TRACING_TARGET_CONNECTION,
                elapsed = ?elapsed,
                "Connection acquisition took longer than expected"
            );
        }

        tracing::debug!(target: TRACING_TARGET_CONNECTION, elapsed = ?elapsed, "Connection acquired");
        Ok(conn)
    }

    /// Records a failed reconnection and takes the pool out of service.
    ///
    /// The first recorded failure wins; later acquisitions report it through
    /// [`PgError::Closed`].
    fn fail_reconnect(&self, cause: diesel::ConnectionError) -> PgError {
        let context = ReconnectContext::new(cause.to_string());

        tracing::error!(
            target: TRACING_TARGET_CONNECTION,
            cause = %context.cause,
            "Reconnection failed, closing connection pool"
        );

        self.inner
            .fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(|| context.clone());
        self.inner.pool.close();

        PgError::Reconnect(context)
    }

    /// Returns the recorded reconnection failure, if any.
    pub fn fault(&self) -> Option<ReconnectContext> {
        self.inner
            .fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Closes the connection pool.
    ///
    /// Outstanding connections finish their current work; new acquisitions
    /// fail with [`PgError::Closed`]. Closing an already closed client is a
    /// no-op.
    pub fn close(&self) {
        if self.inner.pool.is_closed() {
            return;
        }

        tracing::info!(target: TRACING_TARGET_CONNECTION, "Closing connection pool");
        self.inner.pool.close();
    }

    /// Returns whether the connection pool has been closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.pool.is_closed()
    }

    /// Gets the current pool status and statistics.
    #[inline]
    pub fn pool_status(&self) -> PoolStatus {
        PoolStatus::from(self.inner.pool.status())
    }

    /// Gets the database configuration used by this client.
    #[inline]
    pub fn config(&self) -> &PgConfig {
        &self.inner.config
    }

    /// Returns whether two handles refer to the same underlying pool.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for PgClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.pool_status();
        f.debug_struct("PgClient")
            .field("url", &self.inner.config.url_masked())
            .field("max_size", &status.max_size)
            .field("size", &status.size)
            .field("available", &status.available)
            .field("waiting", &status.waiting)
            .field("closed", &self.is_closed())
            .finish()
    }
}
