//! Rate limiting for credential endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing and signup spam.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::auth::{ClientIpHeader, extract_client_ip};

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Bucket shared by every request whose client IP cannot be determined.
const UNKNOWN_CLIENT: &str = "unknown";

const fn nonzero(n: u32) -> NonZeroU32 {
    match NonZeroU32::new(n) {
        Some(n) => n,
        None => panic!("rate limit quota must be non-zero"),
    }
}

const LOGIN_PER_SEC: NonZeroU32 = nonzero(1);
const LOGIN_BURST: NonZeroU32 = nonzero(5);
const REGISTER_PER_MIN: NonZeroU32 = nonzero(3);
const PERMISSIVE_PER_SEC: NonZeroU32 = nonzero(1000);

/// Rate limiting configuration for credential endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login (5 requests, refilling one per second)
    pub login: Arc<IpLimiter>,
    /// Per-IP limiter for registration (3 requests per minute)
    pub register: Arc<IpLimiter>,
    /// Where the client IP comes from when running behind a proxy.
    pub ip_header: Option<ClientIpHeader>,
}

impl RateLimitConfig {
    /// Create rate limiters with production limits.
    pub fn new(ip_header: Option<ClientIpHeader>) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(
                Quota::per_second(LOGIN_PER_SEC).allow_burst(LOGIN_BURST),
            )),
            register: Arc::new(RateLimiter::keyed(Quota::per_minute(REGISTER_PER_MIN))),
            ip_header,
        }
    }

    /// Limits high enough to never trigger in tests.
    pub fn permissive(ip_header: Option<ClientIpHeader>) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(Quota::per_second(PERMISSIVE_PER_SEC))),
            register: Arc::new(RateLimiter::keyed(Quota::per_second(PERMISSIVE_PER_SEC))),
            ip_header,
        }
    }

    fn client_key(&self, request: &Request) -> String {
        extract_client_ip(request, self.ip_header)
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

fn check(limiter: &IpLimiter, key: &str, endpoint: &'static str) -> Result<(), Response> {
    limiter.check_key(&key.to_string()).map_err(|_| {
        warn!(client = %key, endpoint, "Rate limit exceeded");
        (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many attempts. Please wait before trying again.",
        )
            .into_response()
    })
}

/// Middleware for rate limiting login.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let key = config.client_key(&request);
    match check(&config.login, &key, "login") {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}

/// Middleware for rate limiting registration.
pub async fn rate_limit_register(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let key = config.client_key(&request);
    match check(&config.register, &key, "register") {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}
