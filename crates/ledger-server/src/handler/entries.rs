//! CRUD handlers for ledger entries.
//!
//! All statements are issued through the scoped wrappers: reads go through
//! `with_query`, writes through `with_command` so every mutation commits or
//! rolls back as a unit.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use diesel_async::RunQueryDsl;
use diesel_async::scoped_futures::ScopedFutureExt;
use ledger_postgres::{PgClient, PgError};
use serde::{Deserialize, Serialize};

use crate::service::ServiceState;
use crate::{Error, Result};

/// Tracing target for entry operations.
const TRACING_TARGET: &str = "ledger_server::handler::entries";

/// A single ledger entry.
#[derive(Debug, Serialize, Deserialize, diesel::QueryableByName)]
pub struct Entry {
    /// Entry identifier.
    #[diesel(sql_type = diesel::sql_types::Integer)]
    pub id: i32,
    /// Entry payload.
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub value: String,
}

/// Request body for creating or updating an entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct EntryPayload {
    /// Entry payload.
    pub value: String,
}

impl EntryPayload {
    fn validate(&self) -> Result<()> {
        if self.value.is_empty() {
            return Err(Error::bad_request("value must not be empty"));
        }
        Ok(())
    }
}

#[tracing::instrument(skip_all, target = TRACING_TARGET)]
async fn list_entries(State(pg): State<PgClient>) -> Result<Json<Vec<Entry>>> {
    let entries = pg
        .with_query(|conn| {
            async move {
                diesel::sql_query("SELECT id, value FROM entries ORDER BY id")
                    .load(conn)
                    .await
                    .map_err(PgError::from)
                    .map_err(Error::from)
            }
            .scope_boxed()
        })
        .await?;

    Ok(Json(entries))
}

#[tracing::instrument(skip(pg), target = TRACING_TARGET)]
async fn get_entry(State(pg): State<PgClient>, Path(id): Path<i32>) -> Result<Json<Entry>> {
    let entry = pg
        .with_query(|conn| {
            async move {
                diesel::sql_query("SELECT id, value FROM entries WHERE id = $1")
                    .bind::<diesel::sql_types::Integer, _>(id)
                    .get_result(conn)
                    .await
                    .map_err(PgError::from)
                    .map_err(Error::from)
            }
            .scope_boxed()
        })
        .await?;

    Ok(Json(entry))
}

#[tracing::instrument(skip_all, target = TRACING_TARGET)]
async fn create_entry(
    State(pg): State<PgClient>,
    Json(payload): Json<EntryPayload>,
) -> Result<(StatusCode, Json<Entry>)> {
    payload.validate()?;

    let entry: Entry = pg
        .with_command(|conn| {
            async move {
                diesel::sql_query("INSERT INTO entries (value) VALUES ($1) RETURNING id, value")
                    .bind::<diesel::sql_types::Text, _>(payload.value)
                    .get_result(conn)
                    .await
                    .map_err(PgError::Transaction)
                    .map_err(Error::from)
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(target: TRACING_TARGET, id = entry.id, "Created entry");
    Ok((StatusCode::CREATED, Json(entry)))
}

#[tracing::instrument(skip(pg, payload), target = TRACING_TARGET)]
async fn update_entry(
    State(pg): State<PgClient>,
    Path(id): Path<i32>,
    Json(payload): Json<EntryPayload>,
) -> Result<Json<Entry>> {
    payload.validate()?;

    let entry: Entry = pg
        .with_command(|conn| {
            async move {
                diesel::sql_query(
                    "UPDATE entries SET value = $2 WHERE id = $1 RETURNING id, value",
                )
                .bind::<diesel::sql_types::Integer, _>(id)
                .bind::<diesel::sql_types::Text, _>(payload.value)
                .get_result(conn)
                .await
                .map_err(PgError::Transaction)
                .map_err(Error::from)
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(target: TRACING_TARGET, id = entry.id, "Updated entry");
    Ok(Json(entry))
}

#[tracing::instrument(skip(pg), target = TRACING_TARGET)]
async fn delete_entry(State(pg): State<PgClient>, Path(id): Path<i32>) -> Result<StatusCode> {
    let deleted = pg
        .with_command(|conn| {
            async move {
                diesel::sql_query("DELETE FROM entries WHERE id = $1")
                    .bind::<diesel::sql_types::Integer, _>(id)
                    .execute(conn)
                    .await
                    .map_err(PgError::Transaction)
                    .map_err(Error::from)
            }
            .scope_boxed()
        })
        .await?;

    if deleted == 0 {
        return Err(Error::not_found("entry does not exist"));
    }

    tracing::info!(target: TRACING_TARGET, id, "Deleted entry");
    Ok(StatusCode::NO_CONTENT)
}

/// Returns a [`Router`] with all entry routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/entries", get(list_entries).post(create_entry))
        .route(
            "/entries/{id}",
            get(get_entry).put(update_entry).delete(delete_entry),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_rejects_empty_value() {
        let payload = EntryPayload {
            value: String::new(),
        };
        let error = payload.validate().expect_err("empty value is rejected");
        assert_eq!(error.kind(), crate::ErrorKind::BadRequest);
    }

    #[test]
    fn test_payload_accepts_non_empty_value() {
        let payload = EntryPayload {
            value: "deposit".to_owned(),
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_entry_serializes_to_expected_shape() {
        let entry = Entry {
            id: 7,
            value: "deposit".to_owned(),
        };

        let json = serde_json::to_value(&entry).expect("entry serializes");
        assert_eq!(json, serde_json::json!({ "id": 7, "value": "deposit" }));
    }
}
