//! Account and session endpoints.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::{ApiAuthError, Auth, CookiePolicy, MaybeAuth, REFRESH_COOKIE_NAME, get_cookie};
use crate::db::Principal;
use crate::impl_has_auth_backend;
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};
use crate::session::{Credentials, Registration, SessionService};

#[derive(Clone)]
pub struct UsersState {
    pub sessions: Arc<SessionService>,
    pub cookies: CookiePolicy,
    pub no_signup: bool,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    let session_router = Router::new()
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh_token))
        .route("/current-user", get(current_user))
        .with_state(state.clone());

    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    let router = Router::new().merge(session_router).merge(login_router);

    if state.no_signup {
        router
    } else {
        let register_router = Router::new()
            .route("/register", post(register))
            .with_state(state.clone())
            .layer(middleware::from_fn_with_state(
                state.rate_limit_config,
                rate_limit_register,
            ));

        router.merge(register_router)
    }
}

#[derive(Serialize)]
struct UserResponse {
    user: Principal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    user: Principal,
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

async fn register(
    State(state): State<UsersState>,
    Json(payload): Json<Registration>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, tokens) = state.sessions.register(&payload).await?;

    Ok((
        StatusCode::CREATED,
        state.cookies.session_cookies(&tokens),
        Json(UserResponse { user }),
    ))
}

async fn login(
    State(state): State<UsersState>,
    Json(payload): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, tokens) = state.sessions.login(&payload).await?;

    Ok((
        state.cookies.session_cookies(&tokens),
        Json(SessionResponse {
            user,
            access_token: tokens.access.token,
            refresh_token: tokens.refresh.token,
        }),
    ))
}

/// Clears the cookies. The stored refresh token is cleared only when the
/// caller presents a valid access token; a store failure fails the request.
async fn logout(
    State(state): State<UsersState>,
    MaybeAuth(user): MaybeAuth,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(user) = user {
        state.sessions.logout(&user.uuid).await?;
    }

    Ok((
        state.cookies.cleared_cookies(),
        Json(MessageResponse {
            message: "User logged out",
        }),
    ))
}

/// Rotate the refresh token. Read from the cookie, or from a JSON body
/// `{"refreshToken": ...}` for clients that do not keep cookies.
async fn refresh_token(
    State(state): State<UsersState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiAuthError> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .ok()
            .and_then(|req| req.refresh_token)
    };
    let presented = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .filter(|token| !token.is_empty())
        .or(from_body.as_deref());

    let tokens = state
        .sessions
        .rotate(presented)
        .await
        .map_err(|e| ApiAuthError::new(e, state.cookies))?;

    Ok((
        state.cookies.session_cookies(&tokens),
        Json(RefreshResponse {
            access_token: tokens.access.token,
            refresh_token: tokens.refresh.token,
        }),
    ))
}

async fn current_user(Auth(user): Auth) -> Json<UserResponse> {
    Json(UserResponse { user })
}
