use axum::extract::FromRef;
use ledger_postgres::{PgClient, shared};

use crate::Result;

/// Application state shared across all request handlers.
///
/// Cloned per request by `axum`; the contained client is itself a cheap handle
/// over the shared pool.
#[derive(Debug, Clone)]
pub struct ServiceState {
    pg: PgClient,
}

impl ServiceState {
    /// Creates a new service state around an existing database client.
    pub fn new(pg: PgClient) -> Self {
        Self { pg }
    }

    /// Creates a new service state from the shared database client.
    ///
    /// # Errors
    ///
    /// Returns an error if no shared client has been installed.
    pub fn from_shared() -> Result<Self> {
        let pg = shared::get()?;
        Ok(Self { pg })
    }

    /// Returns a handle to the database client.
    #[inline]
    pub fn pg(&self) -> &PgClient {
        &self.pg
    }
}

impl FromRef<ServiceState> for PgClient {
    fn from_ref(state: &ServiceState) -> Self {
        state.pg.clone()
    }
}
