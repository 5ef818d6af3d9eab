//! Process-wide shared database client.
//!
//! The binary installs one [`PgClient`] at startup and every layer above
//! reaches it through this module instead of threading the handle through call
//! chains. The slot is explicit about lifecycle: it can be installed once,
//! swapped for a fresh client (the old pool is closed first), and torn down at
//! shutdown. Test orchestration uses [`replace`] to point the whole process at
//! an isolated database.

use std::sync::{PoisonError, RwLock};

use crate::{PgClient, PgConfig, PgError, PgResult, TRACING_TARGET_CLIENT};

static SHARED: RwLock<Option<PgClient>> = RwLock::new(None);

/// Installs the shared client.
///
/// # Errors
///
/// Returns a configuration error if a client is already installed; use
/// [`replace`] to swap an installed client.
pub fn install(client: PgClient) -> PgResult<()> {
    let mut slot = SHARED.write().unwrap_or_else(PoisonError::into_inner);

    if slot.is_some() {
        return Err(PgError::Config(
            "shared database client is already installed".to_owned(),
        ));
    }

    tracing::info!(
        target: TRACING_TARGET_CLIENT,
        url = %client.config().url_masked(),
        "Installed shared database client"
    );
    *slot = Some(client);
    Ok(())
}

/// Returns a handle to the shared client.
///
/// # Errors
///
/// Returns a configuration error if no client has been installed.
pub fn get() -> PgResult<PgClient> {
    SHARED
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or_else(|| PgError::Config("shared database client is not installed".to_owned()))
}

/// Returns the shared client, initializing it from `make` on first use.
///
/// The configuration closure runs at most once per process; concurrent callers
/// all receive handles to the same client. The pool itself opens connections
/// lazily, so initialization does not touch the database.
pub fn get_or_init<F>(make: F) -> PgResult<PgClient>
where
    F: FnOnce() -> PgConfig,
{
    if let Some(client) = SHARED
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
    {
        return Ok(client);
    }

    let mut slot = SHARED.write().unwrap_or_else(PoisonError::into_inner);
    // Another caller may have won the race between the read and write locks.
    if let Some(client) = slot.clone() {
        return Ok(client);
    }

    let client = make().build()?;
    tracing::info!(
        target: TRACING_TARGET_CLIENT,
        url = %client.config().url_masked(),
        "Initialized shared database client"
    );
    *slot = Some(client.clone());
    Ok(client)
}

/// Replaces the shared client, closing the previous one.
///
/// The old pool is closed before the new client becomes visible, so handles
/// obtained earlier fail fast instead of holding connections to the retired
/// backend. Returns the previous client, if any.
pub fn replace(client: PgClient) -> Option<PgClient> {
    let mut slot = SHARED.write().unwrap_or_else(PoisonError::into_inner);

    let previous = slot.take();
    if let Some(previous) = &previous {
        tracing::info!(
            target: TRACING_TARGET_CLIENT,
            url = %previous.config().url_masked(),
            "Replacing shared database client"
        );
        previous.close();
    }

    *slot = Some(client);
    previous
}

/// Removes and closes the shared client.
///
/// Safe to call when no client is installed.
pub fn close() {
    let mut slot = SHARED.write().unwrap_or_else(PoisonError::into_inner);

    if let Some(client) = slot.take() {
        tracing::info!(target: TRACING_TARGET_CLIENT, "Closing shared database client");
        client.close();
    }
}
