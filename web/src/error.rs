//! Error types for web handlers.
//!
//! [`AppError`] bridges domain errors and HTTP responses. Every body has the
//! same shape:
//!
//! ```json
//! { "code": "CENTER_FULL", "message": "center ... is full" }
//! { "code": "VALIDATION_ERROR", "message": "...", "fields": [{ "field": "name", "message": "..." }] }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use relief_core::error::{FieldError, ReliefError};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    fields: Vec<FieldError>,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            fields: Vec::new(),
            source: None,
        }
    }

    /// Attach an internal cause, logged but never sent.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 for a request the server cannot parse.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// 422 with per-field details.
    #[must_use]
    pub fn validation(fields: Vec<FieldError>) -> Self {
        let message = fields
            .iter()
            .map(|f| format!("{}: {}", f.field, f.message))
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            fields,
            ..Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
        }
    }

    /// 500 with a generic message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", message)
    }

    /// HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Status for each domain error.
///
/// `NEGATIVE_OCCUPANCY` is a 500: it means the ledger disagreed with the
/// registry, which callers cannot fix.
#[must_use]
pub const fn status_for(err: &ReliefError) -> StatusCode {
    match err {
        ReliefError::NotFound { .. } => StatusCode::NOT_FOUND,
        ReliefError::CenterFull { .. }
        | ReliefError::CapacityExceeded { .. }
        | ReliefError::Conflict(_)
        | ReliefError::SameCenter { .. }
        | ReliefError::CenterNotEmpty { .. } => StatusCode::CONFLICT,
        ReliefError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ReliefError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        ReliefError::Forbidden(_) => StatusCode::FORBIDDEN,
        ReliefError::NegativeOccupancy { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        ReliefError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<ReliefError> for AppError {
    fn from(err: ReliefError) -> Self {
        if let ReliefError::Validation(fields) = err {
            return Self::validation(fields);
        }
        Self::new(status_for(&err), err.code(), err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("an internal error occurred").with_source(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "no_fields")]
    fields: &'a [FieldError],
}

fn no_fields(fields: &&[FieldError]) -> bool {
    fields.is_empty()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = %source,
                    "request failed"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "request failed"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: &self.message,
            fields: &self.fields,
        };
        (self.status, Json(body)).into_response()
    }
}
