//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, error};

use crate::session::SessionError;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Unauthorized(String),
    Conflict(String),
    Unavailable(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Database error".into())
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Validation(msg) => Self::BadRequest(msg),
            SessionError::Unauthenticated(reason) => {
                debug!(reason = %reason, "Request rejected");
                Self::unauthorized("Unauthorized request")
            }
            SessionError::Conflict(msg) => Self::Conflict(msg),
            SessionError::PrincipalNotFound => Self::not_found("User not found"),
            SessionError::Store(e) => {
                error!(error = %e, "Store unavailable");
                Self::Unavailable("Service temporarily unavailable".into())
            }
            SessionError::Internal(e) => {
                error!(error = %e, "Session operation failed");
                Self::internal("Internal server error")
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Validate a UUID string format.
pub fn validate_uuid(uuid: &str) -> Result<(), ApiError> {
    if uuid.is_empty() {
        return Err(ApiError::bad_request("UUID cannot be empty"));
    }
    if uuid.len() > 36 {
        return Err(ApiError::bad_request("UUID is too long"));
    }
    if uuid::Uuid::parse_str(uuid).is_err() {
        return Err(ApiError::bad_request("Invalid UUID format"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{AuthFailure, StoreError};

    fn status(e: SessionError) -> StatusCode {
        ApiError::from(e).into_response().status()
    }

    #[test]
    fn test_session_error_status_mapping() {
        assert_eq!(
            status(SessionError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(SessionError::unauthenticated(AuthFailure::TokenReused)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(SessionError::Conflict("taken".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(status(SessionError::PrincipalNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status(SessionError::Store(StoreError::Unavailable("down".into()))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(SessionError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unauthenticated_reason_not_rendered() {
        let ApiError::Unauthorized(msg) =
            ApiError::from(SessionError::unauthenticated(AuthFailure::TokenReused))
        else {
            panic!("expected Unauthorized");
        };
        assert_eq!(msg, "Unauthorized request");
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("not-a-uuid").is_err());
    }
}
