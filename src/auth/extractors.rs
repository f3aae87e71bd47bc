//! Axum extractors for authentication.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};

use super::cookie::{ACCESS_COOKIE_NAME, bearer_token, get_cookie};
use super::errors::ApiAuthError;
use super::state::HasAuthBackend;
use crate::db::Principal;
use crate::session::SessionError;

/// Access token presented by the request: the `accessToken` cookie, or the
/// bearer header when the cookie is absent or empty.
pub fn extract_access_token(headers: &HeaderMap) -> Option<&str> {
    get_cookie(headers, ACCESS_COOKIE_NAME)
        .filter(|token| !token.is_empty())
        .or_else(|| bearer_token(headers))
}

async fn authenticate_request<S>(parts: &Parts, state: &S) -> Result<Principal, SessionError>
where
    S: HasAuthBackend + Send + Sync,
{
    state
        .sessions()
        .authenticate(extract_access_token(&parts.headers))
        .await
}

/// Extractor for endpoints that require an authenticated caller.
pub struct Auth(pub Principal);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state)
            .await
            .map(Auth)
            .map_err(|e| ApiAuthError::new(e, *state.cookies()))
    }
}

/// Optional authentication extractor. An unauthenticated caller yields `None`;
/// store and internal failures still reject.
pub struct MaybeAuth(pub Option<Principal>);

impl<S> FromRequestParts<S> for MaybeAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match authenticate_request(parts, state).await {
            Ok(user) => Ok(MaybeAuth(Some(user))),
            Err(SessionError::Unauthenticated(_)) => Ok(MaybeAuth(None)),
            Err(e) => Err(ApiAuthError::new(e, *state.cookies())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header};

    #[test]
    fn test_cookie_preferred_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=from-cookie"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));

        assert_eq!(extract_access_token(&headers), Some("from-cookie"));
    }

    #[test]
    fn test_bearer_used_when_cookie_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken="));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));

        assert_eq!(extract_access_token(&headers), Some("from-header"));
    }

    #[test]
    fn test_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("refreshToken=abc"));

        assert_eq!(extract_access_token(&headers), None);
    }
}
