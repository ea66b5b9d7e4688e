//! Error types for web handlers.
//!
//! [`AppError`] bridges [`BookingError`] and HTTP responses. Domain errors
//! carry user-facing messages and are passed through verbatim; storage
//! failures are logged with their source and reported generically.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use courtside_core::BookingError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>) -> Result<Json<Booking>, AppError> {
///     let booking = state.service.create_booking(user, request).await?;
///     Ok(Json(booking))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Attach the internal cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// 400 for malformed input.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "VALIDATION_ERROR")
    }

    /// 400 for a taken slot, full match or duplicate registration.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "CONFLICT")
    }

    /// 400 for an unknown, consumed or expired waitlist token.
    #[must_use]
    pub fn expired_or_invalid(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "EXPIRED_OR_INVALID")
    }

    /// 401 for a missing or malformed caller identity.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
    }

    /// 403 for acting on someone else's booking.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message, "FORBIDDEN")
    }

    /// 404.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    /// 500 with a generic message.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "An internal error occurred",
            "INTERNAL_SERVER_ERROR",
        )
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code.
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

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = self.code,
                    error = format!("{source:#}"),
                    "Internal server error"
                );
            } else {
                tracing::error!(status = %self.status, code = self.code, message = %self.message, "Internal server error");
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(message) => Self::validation(message),
            BookingError::Conflict(message) => Self::conflict(message),
            BookingError::ExpiredOrInvalid(message) => Self::expired_or_invalid(message),
            BookingError::Forbidden(message) => Self::forbidden(message),
            BookingError::NotFound(message) => Self::not_found(message),
            storage @ BookingError::Storage(_) => Self::internal().with_source(storage),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal().with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtside_core::StorageError;

    #[test]
    fn test_error_display() {
        let err = AppError::validation("Invalid input");
        assert_eq!(err.to_string(), "[VALIDATION_ERROR] Invalid input");
    }

    #[test]
    fn domain_errors_map_to_status_codes() {
        let cases = [
            (BookingError::validation("x"), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (BookingError::conflict("x"), StatusCode::BAD_REQUEST, "CONFLICT"),
            (
                BookingError::ExpiredOrInvalid("x".into()),
                StatusCode::BAD_REQUEST,
                "EXPIRED_OR_INVALID",
            ),
            (BookingError::forbidden("x"), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (BookingError::not_found("x"), StatusCode::NOT_FOUND, "NOT_FOUND"),
        ];
        for (domain, status, code) in cases {
            let err = AppError::from(domain);
            assert_eq!(err.status(), status);
            assert_eq!(err.code(), code);
            assert_eq!(err.message, "x");
        }
    }

    #[test]
    fn storage_failures_hide_their_details() {
        let err = AppError::from(BookingError::Storage(StorageError::Database(
            "connection refused to 10.0.0.5".into(),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("10.0.0.5"));
        assert!(err.source.is_some());
    }
}
