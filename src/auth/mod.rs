//! Request authentication for the HTTP layer.
//!
//! Access tokens arrive in the `accessToken` cookie or, failing that, an
//! `Authorization: Bearer` header. Extractors resolve them to a `Principal`
//! through the session service; nothing is refreshed implicitly. Clients
//! call the refresh endpoint when the access token expires.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod state;

pub use cookie::{
    ACCESS_COOKIE_NAME, CookiePolicy, DEFAULT_ACCESS_COOKIE_MAX_AGE_SECS, REFRESH_COOKIE_NAME,
    bearer_token, get_cookie,
};
pub use errors::ApiAuthError;
pub use extractors::{Auth, MaybeAuth, extract_access_token};
pub use ip::{ClientIpHeader, HasHeadersAndExtensions, extract_client_ip};
pub use state::HasAuthBackend;
