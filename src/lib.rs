pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod session;

use api::create_api_router;
use auth::CookiePolicy;
use axum::{Json, Router, routing::get};
use db::Database;
use jwt::{JwtConfig, TokenKind, TokenSettings};
use rate_limit::RateLimitConfig;
use serde_json::{Value, json};
use session::{SessionPolicy, SessionService};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Access token secret and lifetime
    pub access_token: TokenSettings,
    /// Refresh token secret and lifetime
    pub refresh_token: TokenSettings,
    /// Whether cookies are marked Secure (public origin is https)
    pub secure_cookies: bool,
    /// Max-Age of the access token cookie, in seconds
    pub access_cookie_max_age: u64,
    pub session_policy: SessionPolicy,
    /// Whether new user signups are disabled
    pub no_signup: bool,
    pub rate_limit: RateLimitConfig,
}

async fn health() -> Json<Value> {
    Json(json!({ "message": "API is running" }))
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.access_token, &config.refresh_token));

    let cookies = CookiePolicy {
        secure: config.secure_cookies,
        access_max_age: config.access_cookie_max_age,
        refresh_max_age: jwt.ttl_secs(TokenKind::Refresh),
    };

    let sessions = Arc::new(SessionService::new(
        config.db.clone(),
        jwt,
        config.session_policy,
    ));

    let api_router = create_api_router(
        config.db.clone(),
        sessions,
        cookies,
        config.no_signup,
        Arc::new(config.rate_limit.clone()),
    );

    Router::new()
        .route("/", get(health))
        .nest("/api/v1", api_router)
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
