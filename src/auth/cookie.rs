//! Cookie and Authorization header handling for session tokens.

use axum::http::{HeaderMap, HeaderName, header};
use axum::response::AppendHeaders;

use crate::session::TokenPair;

/// Cookie name for the access token.
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Default access cookie lifetime (one day). The cookie may outlive the token;
/// an expired token inside a live cookie is still rejected.
pub const DEFAULT_ACCESS_COOKIE_MAX_AGE_SECS: u64 = 24 * 60 * 60;

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Attributes applied to both session cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    /// Served over TLS: adds `Secure` and uses `SameSite=Strict`.
    pub secure: bool,
    pub access_max_age: u64,
    /// Always the refresh token TTL.
    pub refresh_max_age: u64,
}

type SetCookies = AppendHeaders<[(HeaderName, String); 2]>;

impl CookiePolicy {
    fn attributes(&self) -> &'static str {
        if self.secure {
            "HttpOnly; Secure; SameSite=Strict; Path=/"
        } else {
            "HttpOnly; SameSite=Lax; Path=/"
        }
    }

    fn cookie(&self, name: &str, value: &str, max_age: u64) -> String {
        format!(
            "{}={}; {}; Max-Age={}",
            name,
            value,
            self.attributes(),
            max_age
        )
    }

    pub fn access_cookie(&self, token: &str) -> String {
        self.cookie(ACCESS_COOKIE_NAME, token, self.access_max_age)
    }

    pub fn refresh_cookie(&self, token: &str) -> String {
        self.cookie(REFRESH_COOKIE_NAME, token, self.refresh_max_age)
    }

    /// `Set-Cookie` headers carrying a freshly issued pair.
    pub fn session_cookies(&self, pair: &TokenPair) -> SetCookies {
        AppendHeaders([
            (header::SET_COOKIE, self.access_cookie(&pair.access.token)),
            (header::SET_COOKIE, self.refresh_cookie(&pair.refresh.token)),
        ])
    }

    /// `Set-Cookie` headers that remove both session cookies.
    pub fn cleared_cookies(&self) -> SetCookies {
        AppendHeaders([
            (header::SET_COOKIE, self.cookie(ACCESS_COOKIE_NAME, "", 0)),
            (header::SET_COOKIE, self.cookie(REFRESH_COOKIE_NAME, "", 0)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn policy(secure: bool) -> CookiePolicy {
        CookiePolicy {
            secure,
            access_max_age: DEFAULT_ACCESS_COOKIE_MAX_AGE_SECS,
            refresh_max_age: 604800,
        }
    }

    #[test]
    fn test_get_cookie_simple() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=abc123"));

        assert_eq!(get_cookie(&headers, "accessToken"), Some("abc123"));
    }

    #[test]
    fn test_get_cookie_multiple() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; accessToken=abc123; refreshToken=xyz789"),
        );

        assert_eq!(get_cookie(&headers, ACCESS_COOKIE_NAME), Some("abc123"));
        assert_eq!(get_cookie(&headers, REFRESH_COOKIE_NAME), Some("xyz789"));
        assert_eq!(get_cookie(&headers, "foo"), Some("bar"));
    }

    #[test]
    fn test_get_cookie_not_found() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("foo=bar"));

        assert_eq!(get_cookie(&headers, ACCESS_COOKIE_NAME), None);
        assert_eq!(get_cookie(&HeaderMap::new(), ACCESS_COOKIE_NAME), None);
    }

    #[test]
    fn test_get_cookie_empty_value() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=; foo=bar"));

        assert_eq!(get_cookie(&headers, ACCESS_COOKIE_NAME), Some(""));
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer   tok "));
        assert_eq!(bearer_token(&headers), Some("tok"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_secure_cookie_attributes() {
        let cookie = policy(true).refresh_cookie("tok");
        assert_eq!(
            cookie,
            "refreshToken=tok; HttpOnly; Secure; SameSite=Strict; Path=/; Max-Age=604800"
        );
    }

    #[test]
    fn test_insecure_cookie_attributes() {
        let cookie = policy(false).access_cookie("tok");
        assert_eq!(
            cookie,
            "accessToken=tok; HttpOnly; SameSite=Lax; Path=/; Max-Age=86400"
        );
        assert!(!cookie.contains("Secure"));
    }
}
