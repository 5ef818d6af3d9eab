//! Integration tests against a live PostgreSQL server.
//!
//! These tests are ignored by default; run them with `cargo test -- --ignored`
//! against a disposable database. Connection settings come from the
//! environment (`POSTGRES_HOST`, `POSTGRES_PORT`, `POSTGRES_USER`,
//! `POSTGRES_PASSWORD`, `POSTGRES_DBNAME`), loaded through `.env` when
//! present.

use diesel_async::RunQueryDsl;
use diesel_async::scoped_futures::ScopedFutureExt;
use ledger_postgres::{PgClient, PgClientExt, PgConfig, PgError, PgResult};

fn config_from_env() -> PgConfig {
    dotenvy::dotenv().ok();

    let host = std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_owned());
    let port = std::env::var("POSTGRES_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5432);
    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_owned());
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_else(|_| "postgres".to_owned());
    let dbname = std::env::var("POSTGRES_DBNAME").unwrap_or_else(|_| "ledger".to_owned());

    PgConfig::new(host, dbname)
        .with_port(port)
        .with_credentials(user, password)
}

async fn connect_and_migrate() -> PgClient {
    let client = PgClient::connect(config_from_env())
        .await
        .expect("database is reachable");
    client
        .run_pending_migrations()
        .await
        .expect("migrations apply");
    client
}

#[derive(diesel::QueryableByName)]
struct Answer {
    #[diesel(sql_type = diesel::sql_types::Integer)]
    answer: i32,
}

#[derive(diesel::QueryableByName)]
struct RowCount {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    count: i64,
}

async fn count_entries(client: &PgClient, value: &str) -> i64 {
    let value = value.to_owned();
    let row: RowCount = client
        .with_query(|conn| {
            async move {
                diesel::sql_query("SELECT COUNT(*) AS count FROM entries WHERE value = $1")
                    .bind::<diesel::sql_types::Text, _>(value)
                    .get_result(conn)
                    .await
                    .map_err(PgError::from)
            }
            .scope_boxed()
        })
        .await
        .expect("count query succeeds");
    row.count
}

async fn insert_entry(client: &PgClient, value: &str) -> PgResult<()> {
    let value = value.to_owned();
    client
        .with_command(|conn| {
            async move {
                diesel::sql_query("INSERT INTO entries (value) VALUES ($1)")
                    .bind::<diesel::sql_types::Text, _>(value)
                    .execute(conn)
                    .await
                    .map_err(PgError::Transaction)?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
}

#[tokio::test]
#[ignore = "requires a live PostgreSQL server"]
async fn query_returns_rows() {
    let client = connect_and_migrate().await;

    let row: Answer = client
        .with_query(|conn| {
            async move {
                diesel::sql_query("SELECT 42 AS answer")
                    .get_result(conn)
                    .await
                    .map_err(PgError::from)
            }
            .scope_boxed()
        })
        .await
        .expect("query succeeds");

    assert_eq!(row.answer, 42);
    client.close();
}

#[tokio::test]
#[ignore = "requires a live PostgreSQL server"]
async fn command_commits_on_success() {
    let client = connect_and_migrate().await;
    let value = format!("commit-{}", std::process::id());

    insert_entry(&client, &value).await.expect("insert commits");
    assert_eq!(count_entries(&client, &value).await, 1);
    client.close();
}

#[tokio::test]
#[ignore = "requires a live PostgreSQL server"]
async fn command_rolls_back_on_error() {
    let client = connect_and_migrate().await;
    let value = format!("rollback-{}", std::process::id());

    let inner = value.clone();
    let result: PgResult<()> = client
        .with_command(|conn| {
            async move {
                diesel::sql_query("INSERT INTO entries (value) VALUES ($1)")
                    .bind::<diesel::sql_types::Text, _>(inner)
                    .execute(conn)
                    .await
                    .map_err(PgError::Transaction)?;
                Err(PgError::Unexpected("synthetic failure".into()))
            }
            .scope_boxed()
        })
        .await;

    assert!(result.is_err());
    assert_eq!(count_entries(&client, &value).await, 0);
    client.close();
}

#[tokio::test]
#[ignore = "requires a live PostgreSQL server"]
async fn concurrent_commands_use_distinct_connections() {
    let client = connect_and_migrate().await;
    let value = format!("concurrent-{}", std::process::id());

    let (a, b) = tokio::join!(insert_entry(&client, &value), insert_entry(&client, &value));
    a.expect("first insert commits");
    b.expect("second insert commits");

    assert_eq!(count_entries(&client, &value).await, 2);
    client.close();
}

#[tokio::test]
#[ignore = "requires a live PostgreSQL server"]
async fn statement_failure_in_command_carries_transaction_flavor() {
    let client = connect_and_migrate().await;

    let result: PgResult<usize> = client
        .with_command(|conn| {
            async move {
                diesel::sql_query("INSERT INTO entries (value) VALUES (NULL)")
                    .execute(conn)
                    .await
                    .map_err(PgError::Transaction)
            }
            .scope_boxed()
        })
        .await;

    let error = result.expect_err("null value violates the not-null constraint");
    assert!(matches!(error, PgError::Transaction(_)));

    let context = error.context();
    assert_eq!(context["kind"], serde_json::json!("transaction"));
    assert!(
        context["message"]
            .as_str()
            .expect("message is a string")
            .contains("during transaction")
    );
    client.close();
}

#[tokio::test]
#[ignore = "requires a live PostgreSQL server"]
async fn driver_error_carries_diagnostic_context() {
    let client = connect_and_migrate().await;

    let result: PgResult<usize> = client
        .with_query(|conn| {
            async move {
                diesel::sql_query("SELECT * FROM table_that_does_not_exist")
                    .execute(conn)
                    .await
                    .map_err(PgError::from)
            }
            .scope_boxed()
        })
        .await;

    let error = result.expect_err("query fails");
    assert!(matches!(error, PgError::Query(_)));

    let context = error.context();
    assert_eq!(context["kind"], serde_json::json!("query"));
    assert!(context.contains_key("db_message"));
    client.close();
}

#[tokio::test]
#[ignore = "requires a live PostgreSQL server"]
async fn revert_removes_applied_migrations() {
    let client = connect_and_migrate().await;

    let report = client
        .revert_all_migrations()
        .await
        .expect("revert succeeds");
    assert!(!report.versions.is_empty());

    let report = client
        .run_pending_migrations()
        .await
        .expect("reapply succeeds");
    assert!(!report.is_noop());
    client.close();
}
