//! Session error taxonomy.

use crate::jwt::JwtError;
use crate::password::PasswordError;

use super::store::StoreError;

/// Why a request was rejected as unauthenticated.
///
/// Logged server-side only. Every reason renders the same response.
#[derive(Debug, thiserror::Error)]
pub enum AuthFailure {
    #[error("no token presented")]
    MissingToken,
    #[error("token rejected: {0}")]
    InvalidToken(#[from] JwtError),
    #[error("token subject no longer exists")]
    UnknownPrincipal,
    #[error("refresh token does not match the stored token")]
    TokenReused,
    #[error("refresh token was superseded concurrently")]
    RotationConflict,
    #[error("bad credentials")]
    BadCredentials,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unauthenticated: {0}")]
    Unauthenticated(AuthFailure),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("principal not found")]
    PrincipalNotFound,
    #[error(transparent)]
    Store(StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("max active sessions must be 1, got {0}")]
    UnsupportedSessionCount(usize),
}

impl SessionError {
    pub fn unauthenticated(reason: impl Into<AuthFailure>) -> Self {
        SessionError::Unauthenticated(reason.into())
    }
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate => SessionError::Conflict("User already exists".into()),
            other => SessionError::Store(other),
        }
    }
}

impl From<PasswordError> for SessionError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::TooShort | PasswordError::TooLong => {
                SessionError::Validation(e.to_string())
            }
            PasswordError::Hash(_) | PasswordError::MalformedHash(_) => {
                SessionError::Internal(e.to_string())
            }
        }
    }
}
