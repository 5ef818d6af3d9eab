//! Embedded migration management.
//!
//! Migrations are compiled into the binary from the crate's `migrations/`
//! directory and applied through a pooled connection. The migration harness is
//! blocking, so it runs on the blocking thread pool behind an
//! [`AsyncConnectionWrapper`].

use std::time::{Duration, Instant};

use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_migrations::MigrationHarness;
use tokio::task::spawn_blocking;

use crate::{MIGRATIONS, PgClient, PgError, PgResult, TRACING_TARGET_MIGRATION};

/// Outcome of a completed migration run.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    /// Total time the migration run took.
    pub duration: Duration,
    /// Versions applied (or reverted), in execution order.
    pub versions: Vec<String>,
}

impl MigrationReport {
    /// Returns whether the run changed anything.
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Runs all pending migrations on the database.
///
/// Safe to call on an up-to-date database; the run is then a no-op.
#[tracing::instrument(skip(pg), target = TRACING_TARGET_MIGRATION)]
pub async fn run_pending_migrations(pg: &PgClient) -> PgResult<MigrationReport> {
    tracing::info!(target: TRACING_TARGET_MIGRATION, "Applying pending database migrations");

    let start = Instant::now();
    let conn = pg.get_connection().await?;
    let mut conn: AsyncConnectionWrapper<_> = conn.into();

    let versions = spawn_blocking(move || {
        conn.run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.into_iter().map(|v| v.to_string()).collect())
    })
    .await
    .map_err(|err| join_failure(err, start.elapsed()))?
    .map_err(|err| migration_failure(err, start.elapsed()))?;

    let report = MigrationReport {
        duration: start.elapsed(),
        versions,
    };

    if report.is_noop() {
        tracing::info!(target: TRACING_TARGET_MIGRATION, "Database schema is already up to date");
    } else {
        tracing::info!(
            target: TRACING_TARGET_MIGRATION,
            duration = ?report.duration,
            migrations_count = report.versions.len(),
            "Database migrations applied"
        );
    }

    Ok(report)
}

/// Reverts every applied migration, leaving an empty schema.
///
/// Used by test orchestration to reset an isolated database.
#[tracing::instrument(skip(pg), target = TRACING_TARGET_MIGRATION)]
pub async fn revert_all_migrations(pg: &PgClient) -> PgResult<MigrationReport> {
    tracing::warn!(target: TRACING_TARGET_MIGRATION, "Reverting all database migrations");

    let start = Instant::now();
    let conn = pg.get_connection().await?;
    let mut conn: AsyncConnectionWrapper<_> = conn.into();

    let versions = spawn_blocking(move || {
        conn.revert_all_migrations(MIGRATIONS)
            .map(|versions| versions.into_iter().map(|v| v.to_string()).collect())
    })
    .await
    .map_err(|err| join_failure(err, start.elapsed()))?
    .map_err(|err| migration_failure(err, start.elapsed()))?;

    let report = MigrationReport {
        duration: start.elapsed(),
        versions,
    };

    tracing::info!(
        target: TRACING_TARGET_MIGRATION,
        duration = ?report.duration,
        migrations_count = report.versions.len(),
        "Database migrations reverted"
    );

    Ok(report)
}

fn join_failure(err: tokio::task::JoinError, duration: Duration) -> PgError {
    tracing::error!(
        target: TRACING_TARGET_MIGRATION,
        duration = ?duration,
        error = %err,
        "Migration task panicked"
    );
    PgError::Migration(err.into())
}

fn migration_failure(err: crate::BoxError, duration: Duration) -> PgError {
    tracing::error!(
        target: TRACING_TARGET_MIGRATION,
        duration = ?duration,
        error = &err,
        "Database migration run failed"
    );
    PgError::Migration(err)
}

/// Extension trait providing migration functionality for [`PgClient`].
///
/// Keeps migration-related methods separate from the core client while letting
/// call sites write `client.run_pending_migrations()`.
pub trait PgClientExt {
    /// Runs all pending database migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if any migration fails to apply or if there are
    /// connectivity issues with the database.
    fn run_pending_migrations(&self) -> impl Future<Output = PgResult<MigrationReport>>;

    /// Reverts every applied migration.
    ///
    /// # Errors
    ///
    /// Returns an error if any migration fails to revert or if there are
    /// connectivity issues with the database.
    fn revert_all_migrations(&self) -> impl Future<Output = PgResult<MigrationReport>>;
}

impl PgClientExt for PgClient {
    async fn run_pending_migrations(&self) -> PgResult<MigrationReport> {
        run_pending_migrations(self).await
    }

    async fn revert_all_migrations(&self) -> PgResult<MigrationReport> {
        revert_all_migrations(self).await
    }
}
