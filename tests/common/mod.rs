#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use inkpost::{
    ServerConfig, create_app,
    db::Database,
    jwt::TokenSettings,
    rate_limit::RateLimitConfig,
    session::{RotationMode, SessionPolicy},
};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const ACCESS_TTL: u64 = 60;
pub const REFRESH_TTL: u64 = 3600;
pub const PASSWORD: &str = "abc123pass";

pub fn test_config(db: Database) -> ServerConfig {
    ServerConfig {
        db,
        access_token: TokenSettings {
            secret: b"integration-access-secret-0123456789".to_vec(),
            ttl_secs: ACCESS_TTL,
        },
        refresh_token: TokenSettings {
            secret: b"integration-refresh-secret-0123456789".to_vec(),
            ttl_secs: REFRESH_TTL,
        },
        secure_cookies: false,
        access_cookie_max_age: 86400,
        session_policy: SessionPolicy::single_session(RotationMode::Overwrite),
        no_signup: false,
        rate_limit: RateLimitConfig::permissive(None),
    }
}

pub async fn test_db() -> Database {
    Database::open(":memory:")
        .await
        .expect("Failed to open test database")
}

pub async fn create_test_app() -> Router {
    create_app(&test_config(test_db().await))
}

/// Build a request with an optional JSON body and optional Cookie header.
pub fn request(method: &str, uri: &str, body: Option<Value>, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// All Set-Cookie header values of a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// The full Set-Cookie line for `name`.
pub fn set_cookie_line(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with(&prefix))
}

/// The value a Set-Cookie header assigns to `name`.
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    let line = set_cookie_line(response, name)?;
    let (pair, _) = line.split_once(';')?;
    let (_, value) = pair.split_once('=')?;
    Some(value.to_string())
}

pub struct Session {
    pub user_id: String,
    pub access: String,
    pub refresh: String,
}

impl Session {
    pub fn access_cookie(&self) -> String {
        format!("accessToken={}", self.access)
    }

    pub fn refresh_cookie(&self) -> String {
        format!("refreshToken={}", self.refresh)
    }
}

pub async fn register(app: &Router, username: &str, email: &str) -> Session {
    let response = send(
        app,
        request(
            "POST",
            "/api/v1/users/register",
            Some(json!({ "username": username, "email": email, "password": PASSWORD })),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), 201, "registration of {} failed", username);

    let access = cookie_value(&response, "accessToken").unwrap();
    let refresh = cookie_value(&response, "refreshToken").unwrap();
    let json = body_json(response).await;

    Session {
        user_id: json["user"]["id"].as_str().unwrap().to_string(),
        access,
        refresh,
    }
}
