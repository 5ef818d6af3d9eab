//! Shared service state for the HTTP layer.

mod state;

pub use state::ServiceState;
