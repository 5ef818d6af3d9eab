//! System health monitoring handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use diesel_async::RunQueryDsl;
use diesel_async::scoped_futures::ScopedFutureExt;
use ledger_postgres::{PgClient, PgError, PoolStatus};
use serde::Serialize;

use crate::service::ServiceState;

/// Tracing target for monitor operations.
const TRACING_TARGET: &str = "ledger_server::handler::monitors";

/// Health status of the service and its database.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Whether the database answered the probe.
    pub is_healthy: bool,
    /// Snapshot of the connection pool.
    pub pool: PoolStatus,
}

#[derive(diesel::QueryableByName)]
struct HealthProbe {
    #[diesel(sql_type = diesel::sql_types::Integer)]
    #[allow(dead_code)]
    result: i32,
}

/// Probes database connectivity and reports pool statistics.
#[tracing::instrument(skip_all, target = TRACING_TARGET)]
async fn health_status(State(pg): State<PgClient>) -> (StatusCode, Json<HealthResponse>) {
    let probe: Result<HealthProbe, PgError> = pg
        .with_query(|conn| {
            async move {
                diesel::sql_query("SELECT 1 AS result")
                    .get_result(conn)
                    .await
                    .map_err(PgError::from)
            }
            .scope_boxed()
        })
        .await;

    let is_healthy = match probe {
        Ok(_) => true,
        Err(error) => {
            tracing::warn!(
                target: TRACING_TARGET,
                error = %error,
                "Health probe failed"
            );
            false
        }
    };

    let status_code = if is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        is_healthy,
        pool: pg.pool_status(),
    };

    (status_code, Json(response))
}

/// Returns a [`Router`] with all health monitoring routes.
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/health", get(health_status))
}
