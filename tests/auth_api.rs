use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use brewjournal::{app::build_app, state::AppState};

fn app() -> Router {
    build_app(AppState::fake())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builder");
    send(app, request).await
}

async fn register(app: &Router, email: &str) -> (StatusCode, Value) {
    post_json(
        app,
        "/v1/auth/register",
        json!({ "email": email, "password": "password123", "displayName": "A" }),
    )
    .await
}

#[tokio::test]
async fn register_returns_created_user_and_tokens() {
    let app = app();
    let (status, body) = register(&app, "a@x.com").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["user"]["email"], "a@x.com");
    assert_eq!(body["data"]["user"]["displayName"], "A");
    assert!(body["data"]["user"]["id"].is_string());
    assert!(body["data"]["user"]["createdAt"].is_string());
    assert!(!body["data"]["token"].as_str().unwrap_or("").is_empty());
    assert!(!body["data"]["refreshToken"].as_str().unwrap_or("").is_empty());
}

#[tokio::test]
async fn duplicate_registration_is_a_validation_error() {
    let app = app();
    let (status, _) = register(&app, "a@x.com").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = register(&app, "a@x.com").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn registration_validates_the_body() {
    let app = app();

    let (status, body) = post_json(
        &app,
        "/v1/auth/register",
        json!({ "email": "not-an-email", "password": "password123", "displayName": "A" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = post_json(
        &app,
        "/v1/auth/register",
        json!({ "email": "a@x.com", "password": "short", "displayName": "A" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = post_json(
        &app,
        "/v1/auth/register",
        json!({ "email": "a@x.com", "password": "password123", "displayName": "  " }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    // Missing field: the body never decodes.
    let (status, body) = post_json(
        &app,
        "/v1/auth/register",
        json!({ "email": "a@x.com", "displayName": "A" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn registration_normalizes_email_case() {
    let app = app();
    let (status, body) = post_json(
        &app,
        "/v1/auth/register",
        json!({ "email": "  A@X.Com ", "password": "password123", "displayName": "A" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"]["email"], "a@x.com");

    // Same address in a different case is still taken.
    let (status, _) = register(&app, "a@x.com").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_succeeds_and_reports_last_login() {
    let app = app();
    register(&app, "a@x.com").await;

    let (status, body) = post_json(
        &app,
        "/v1/auth/login",
        json!({ "email": "a@x.com", "password": "password123" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["user"]["email"], "a@x.com");
    assert!(body["data"]["user"]["lastLoginAt"].is_string());
    assert!(!body["data"]["token"].as_str().unwrap_or("").is_empty());
}

#[tokio::test]
async fn bad_logins_are_indistinguishable() {
    let app = app();
    register(&app, "a@x.com").await;

    let (wrong_status, wrong_body) = post_json(
        &app,
        "/v1/auth/login",
        json!({ "email": "a@x.com", "password": "not-the-password" }),
    )
    .await;
    let (unknown_status, unknown_body) = post_json(
        &app,
        "/v1/auth/login",
        json!({ "email": "b@x.com", "password": "password123" }),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body["error"]["code"], "INVALID_CREDENTIALS");
    // Byte-identical bodies: nothing leaks whether the account exists.
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn refresh_rotates_the_token_pair() {
    let app = app();
    let (_, body) = register(&app, "a@x.com").await;
    let refresh_token = body["data"]["refreshToken"].as_str().expect("refresh token");

    let (status, body) = post_json(
        &app,
        "/v1/auth/refresh",
        json!({ "refreshToken": refresh_token }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["data"]["token"].as_str().unwrap_or("").is_empty());
    assert!(!body["data"]["refreshToken"].as_str().unwrap_or("").is_empty());
}

#[tokio::test]
async fn refresh_rejects_access_tokens_and_garbage() {
    let app = app();
    let (_, body) = register(&app, "a@x.com").await;
    let access_token = body["data"]["token"].as_str().expect("access token");

    let (status, body) = post_json(
        &app,
        "/v1/auth/refresh",
        json!({ "refreshToken": access_token }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");

    let (status, body) = post_json(
        &app,
        "/v1/auth/refresh",
        json!({ "refreshToken": "garbage" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn me_returns_the_profile_for_a_valid_bearer_token() {
    let app = app();
    let (_, body) = register(&app, "a@x.com").await;
    let token = body["data"]["token"].as_str().expect("access token");

    let request = Request::builder()
        .method(Method::GET)
        .uri("/v1/users/me")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request builder");
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["email"], "a@x.com");
    assert_eq!(body["data"]["displayName"], "A");
    assert_eq!(body["data"]["bio"], "");
    assert!(body["data"]["preferences"].is_object());
    assert!(body["data"].get("passwordHash").is_none());
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn me_requires_a_bearer_token() {
    let app = app();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/v1/users/me")
        .body(Body::empty())
        .expect("request builder");
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTHENTICATION_REQUIRED");

    let request = Request::builder()
        .method(Method::GET)
        .uri("/v1/users/me")
        .header(header::AUTHORIZATION, "Bearer garbage")
        .body(Body::empty())
        .expect("request builder");
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn me_rejects_refresh_tokens() {
    let app = app();
    let (_, body) = register(&app, "a@x.com").await;
    let refresh_token = body["data"]["refreshToken"].as_str().expect("refresh token");

    let request = Request::builder()
        .method(Method::GET)
        .uri("/v1/users/me")
        .header(header::AUTHORIZATION, format!("Bearer {refresh_token}"))
        .body(Body::empty())
        .expect("request builder");
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
}
