mod common;

use axum::http::{StatusCode, header};
use common::*;
use inkpost::{create_app, rate_limit::RateLimitConfig};
use serde_json::json;

#[tokio::test]
async fn test_health() {
    let app = create_test_app().await;

    let response = send(&app, request("GET", "/", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "API is running");
}

/// Register, log in, rotate twice, log out.
#[tokio::test]
async fn test_full_session_lifecycle() {
    let app = create_test_app().await;

    // Register
    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/register",
            Some(json!({ "username": "sujan", "email": "s@x.com", "password": "abc123pass" })),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(cookie_value(&response, "accessToken").is_some());
    assert!(cookie_value(&response, "refreshToken").is_some());
    let json = body_json(response).await;
    assert_eq!(json["user"]["username"], "sujan");
    assert_eq!(json["user"]["email"], "s@x.com");
    assert!(json["user"].get("passwordHash").is_none());
    assert!(json["user"].get("refreshToken").is_none());

    // Login
    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/login",
            Some(json!({ "username": "sujan", "password": "abc123pass" })),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let access = cookie_value(&response, "accessToken").unwrap();
    let original_refresh = cookie_value(&response, "refreshToken").unwrap();
    let json = body_json(response).await;
    assert_eq!(json["user"]["username"], "sujan");
    assert_eq!(json["accessToken"], access.as_str());

    // Refresh
    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/refresh-token",
            None,
            Some(&format!("refreshToken={}", original_refresh)),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let latest_access = cookie_value(&response, "accessToken").unwrap();
    let latest_refresh = cookie_value(&response, "refreshToken").unwrap();
    assert_ne!(latest_refresh, original_refresh);

    // Replaying the original refresh token fails
    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/refresh-token",
            None,
            Some(&format!("refreshToken={}", original_refresh)),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Logout
    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/logout",
            None,
            Some(&format!("accessToken={}", latest_access)),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cookie_value(&response, "accessToken").as_deref(), Some(""));
    assert_eq!(cookie_value(&response, "refreshToken").as_deref(), Some(""));

    // The latest refresh token died with the session
    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/refresh-token",
            None,
            Some(&format!("refreshToken={}", latest_refresh)),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_current_user_with_cookie() {
    let app = create_test_app().await;
    let session = register(&app, "alice", "alice@example.com").await;

    let response = send(
        &app,
        request(
            "GET",
            "/api/v1/users/current-user",
            None,
            Some(&session.access_cookie()),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["user"]["id"], session.user_id.as_str());
    assert_eq!(json["user"]["username"], "alice");
}

#[tokio::test]
async fn test_current_user_with_bearer_header() {
    let app = create_test_app().await;
    let session = register(&app, "alice", "alice@example.com").await;

    let mut req = request("GET", "/api/v1/users/current-user", None, Some("accessToken="));
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", session.access).parse().unwrap(),
    );

    let response = send(&app, req).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["username"], "alice");
}

#[tokio::test]
async fn test_current_user_unauthenticated_clears_cookies() {
    let app = create_test_app().await;

    let response = send(&app, request("GET", "/api/v1/users/current-user", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let access = set_cookie_line(&response, "accessToken").unwrap();
    assert!(access.contains("Max-Age=0"));
    assert!(set_cookie_line(&response, "refreshToken").is_some());
    assert_eq!(body_json(response).await["error"], "Unauthorized request");
}

#[tokio::test]
async fn test_refresh_token_rejected_as_access_token() {
    let app = create_test_app().await;
    let session = register(&app, "alice", "alice@example.com").await;

    let response = send(
        &app,
        request(
            "GET",
            "/api/v1/users/current-user",
            None,
            Some(&format!("accessToken={}", session.refresh)),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // And the other way around
    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/refresh-token",
            None,
            Some(&format!("refreshToken={}", session.access)),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_from_json_body() {
    let app = create_test_app().await;
    let session = register(&app, "alice", "alice@example.com").await;

    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/refresh-token",
            Some(json!({ "refreshToken": &session.refresh })),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["accessToken"].as_str().is_some());
    assert_ne!(json["refreshToken"], session.refresh.as_str());
}

#[tokio::test]
async fn test_refresh_without_token() {
    let app = create_test_app().await;

    let response = send(&app, request("POST", "/api/v1/users/refresh-token", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie_line(&response, "refreshToken").is_some());
}

#[tokio::test]
async fn test_login_ends_previous_session() {
    let app = create_test_app().await;
    let first = register(&app, "alice", "alice@example.com").await;

    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/login",
            Some(json!({ "email": "ALICE@example.com", "password": PASSWORD })),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/refresh-token",
            None,
            Some(&first.refresh_cookie()),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_failures() {
    let app = create_test_app().await;
    register(&app, "alice", "alice@example.com").await;

    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/login",
            Some(json!({ "username": "alice", "password": "wrong-password" })),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&response).is_empty());
    assert_eq!(body_json(response).await["error"], "Unauthorized request");

    // Unknown accounts look the same as wrong passwords
    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/login",
            Some(json!({ "username": "nobody", "password": PASSWORD })),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/login",
            Some(json!({ "password": PASSWORD })),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_duplicate_and_validation() {
    let app = create_test_app().await;
    register(&app, "alice", "alice@example.com").await;

    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/register",
            Some(json!({ "username": "Alice", "email": "new@example.com", "password": PASSWORD })),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/register",
            Some(json!({ "username": "bob", "email": "bob@example.com" })),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "All fields are required");

    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/register",
            Some(json!({ "username": "bob", "email": "bob@example.com", "password": "short" })),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout_without_session_still_clears_cookies() {
    let app = create_test_app().await;

    let response = send(&app, request("POST", "/api/v1/users/logout", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(set_cookies(&response).len(), 2);
}

#[tokio::test]
async fn test_logout_during_store_outage_is_retryable() {
    let db = test_db().await;
    let app = create_app(&test_config(db.clone()));
    let session = register(&app, "alice", "alice@example.com").await;

    sqlx::query("ALTER TABLE users RENAME TO users_offline")
        .execute(db.pool())
        .await
        .unwrap();

    let response = send(
        &app,
        request("POST", "/api/v1/users/logout", None, Some(&session.access_cookie())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(set_cookies(&response).is_empty());

    sqlx::query("ALTER TABLE users_offline RENAME TO users")
        .execute(db.pool())
        .await
        .unwrap();

    // Retrying once the store is back revokes the refresh token
    let response = send(
        &app,
        request("POST", "/api/v1/users/logout", None, Some(&session.access_cookie())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/refresh-token",
            None,
            Some(&session.refresh_cookie()),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_insecure_cookie_attributes() {
    let app = create_test_app().await;

    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/register",
            Some(json!({ "username": "alice", "email": "alice@example.com", "password": PASSWORD })),
            None,
        ),
    )
    .await;

    let access = set_cookie_line(&response, "accessToken").unwrap();
    assert!(access.contains("HttpOnly"));
    assert!(access.contains("Path=/"));
    assert!(access.contains("SameSite=Lax"));
    assert!(access.contains("Max-Age=86400"));
    assert!(!access.contains("Secure"));

    let refresh = set_cookie_line(&response, "refreshToken").unwrap();
    assert!(refresh.contains(&format!("Max-Age={}", REFRESH_TTL)));
}

#[tokio::test]
async fn test_secure_cookie_attributes() {
    let mut config = test_config(test_db().await);
    config.secure_cookies = true;
    let app = create_app(&config);

    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/register",
            Some(json!({ "username": "alice", "email": "alice@example.com", "password": PASSWORD })),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    for line in set_cookies(&response) {
        assert!(line.contains("Secure"), "cookie not secure: {}", line);
        assert!(line.contains("SameSite=Strict"), "cookie not strict: {}", line);
    }
}

#[tokio::test]
async fn test_no_signup_disables_register() {
    let mut config = test_config(test_db().await);
    config.no_signup = true;
    let app = create_app(&config);

    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/users/register",
            Some(json!({ "username": "alice", "email": "alice@example.com", "password": PASSWORD })),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_login_rate_limited() {
    let mut config = test_config(test_db().await);
    config.rate_limit = RateLimitConfig::new(None);
    let app = create_app(&config);

    // Missing credentials fail validation before any hashing
    let mut statuses = Vec::new();
    for _ in 0..6 {
        let response = send(
            &app,
            request("POST", "/api/v1/users/login", Some(json!({})), None),
        )
        .await;
        statuses.push(response.status());
    }

    assert!(statuses[..5].iter().all(|s| *s == StatusCode::BAD_REQUEST));
    assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
}
