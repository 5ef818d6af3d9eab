//! HTTP layer error types and response mapping.
//!
//! Handlers return a single [`Error`] type; it carries an error kind that maps
//! to an HTTP status code and a structured details object surfaced in the JSON
//! response body. Database failures arrive here already translated into
//! [`PgError`], so the mapping from driver conditions to status codes lives in
//! exactly one place.

use std::borrow::Cow;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ledger_postgres::PgError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tracing target for error responses.
const TRACING_TARGET: &str = "ledger_server::error";

/// Result type alias for handler operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error kind enumeration for categorizing handler errors.
///
/// Each kind corresponds to one HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request was malformed or failed validation.
    BadRequest,
    /// The requested resource does not exist.
    NotFound,
    /// The service cannot reach its database right now.
    Unavailable,
    /// Unexpected internal failure.
    Internal,
}

impl ErrorKind {
    /// Returns the error kind as a string for categorization.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }

    /// Returns the HTTP status code for this kind.
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Handler error with structured information.
#[derive(Debug, thiserror::Error)]
#[error("{} error: {message}", .kind.as_str())]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    details: Option<Value>,
}

impl Error {
    fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new bad request error.
    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// Creates a new not found error.
    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates a new service unavailable error.
    pub fn unavailable(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    /// Creates a new internal error.
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attaches structured details surfaced in the response body.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<PgError> for Error {
    fn from(error: PgError) -> Self {
        let kind = if error.is_not_found() {
            ErrorKind::NotFound
        } else {
            match &error {
                PgError::Timeout(_)
                | PgError::Saturated { .. }
                | PgError::Connection(_)
                | PgError::Reconnect(_)
                | PgError::Closed(_) => ErrorKind::Unavailable,
                _ => ErrorKind::Internal,
            }
        };

        let message: Cow<'static, str> = match kind {
            ErrorKind::NotFound => "resource not found".into(),
            ErrorKind::Unavailable => "database is unavailable".into(),
            _ => "database operation failed".into(),
        };

        Self {
            kind,
            message,
            details: Some(Value::Object(error.context())),
        }
    }
}

/// JSON body returned for every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error kind as a short string.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Structured diagnostic details, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.kind.status_code();

        if status.is_server_error() {
            tracing::error!(
                target: TRACING_TARGET,
                kind = self.kind.as_str(),
                message = %self.message,
                details = ?self.details,
                "Request failed"
            );
        } else {
            tracing::debug!(
                target: TRACING_TARGET,
                kind = self.kind.as_str(),
                message = %self.message,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: self.kind.as_str().to_owned(),
            message: self.message.into_owned(),
            details: self.details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use ledger_postgres::TimeoutType;

    use super::*;

    #[test]
    fn test_kind_maps_to_status_code() {
        assert_eq!(ErrorKind::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorKind::Unavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorKind::Internal.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_row_maps_to_not_found() {
        let error = Error::from(PgError::Query(diesel::result::Error::NotFound));
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_pool_exhaustion_maps_to_unavailable() {
        let timeout = Error::from(PgError::Timeout(TimeoutType::Wait));
        assert_eq!(timeout.kind(), ErrorKind::Unavailable);

        let saturated = Error::from(PgError::Saturated {
            waiting: 5,
            max_waiting: 5,
        });
        assert_eq!(saturated.kind(), ErrorKind::Unavailable);

        let closed = Error::from(PgError::Closed(None));
        assert_eq!(closed.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_database_details_are_preserved() {
        let error = Error::from(PgError::Config("bad settings".to_owned()));
        assert_eq!(error.kind(), ErrorKind::Internal);

        let details = error.details.as_ref().and_then(Value::as_object);
        let details = details.expect("details object is attached");
        assert_eq!(details["kind"], serde_json::json!("config"));
    }
}
