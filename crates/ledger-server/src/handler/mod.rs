//! Request handlers for the HTTP layer.

pub mod entries;
pub mod monitors;

use axum::Router;

pub use crate::error::{Error, Result};
use crate::service::ServiceState;

/// Returns a [`Router`] with all application routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .merge(entries::routes())
        .merge(monitors::routes())
}
