//! Authentication error response.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, error};

use super::cookie::CookiePolicy;
use crate::session::SessionError;

/// Rejection from the auth extractors. Renders JSON and clears both cookies
/// when the caller is unauthenticated.
#[derive(Debug)]
pub struct ApiAuthError {
    error: SessionError,
    cookies: CookiePolicy,
}

impl ApiAuthError {
    pub fn new(error: SessionError, cookies: CookiePolicy) -> Self {
        Self { error, cookies }
    }

    pub fn error(&self) -> &SessionError {
        &self.error
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.error {
            SessionError::Store(e) => {
                error!(error = %e, "Store unavailable during authentication");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable",
                )
            }
            SessionError::Internal(e) => {
                error!(error = %e, "Authentication failed internally");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            other => {
                debug!(reason = %other, "Request rejected");
                (StatusCode::UNAUTHORIZED, "Unauthorized request")
            }
        };

        let body = Json(ErrorResponse { error: message });
        if status == StatusCode::UNAUTHORIZED {
            (status, self.cookies.cleared_cookies(), body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
