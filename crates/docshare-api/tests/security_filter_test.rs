//! Request security filter integration tests.
//!
//! Run with: `cargo test -p docshare-api --test security_filter_test`

mod helpers;

use axum_test::TestResponse;
use helpers::auth::{bearer, login_test_user};
use helpers::{api_path, setup_test_app, setup_test_app_with};
use serde_json::{json, Value};

const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
];

fn assert_security_headers(response: &TestResponse) {
    for (name, value) in SECURITY_HEADERS {
        assert_eq!(response.header(name), value, "header {}", name);
    }
    let csp = response.header("content-security-policy");
    assert!(!csp.is_empty());
}

#[tokio::test]
async fn test_headers_on_success() {
    let app = setup_test_app().await;

    let response = app.client().get(&api_path("/health")).await;

    assert_eq!(response.status_code(), 200);
    assert_security_headers(&response);
    assert!(response.maybe_header("x-request-id").is_some());
}

#[tokio::test]
async fn test_headers_on_errors() {
    let app = setup_test_app().await;
    let client = app.client();

    let unauthorized = client.get(&api_path("/auth/me")).await;
    assert_eq!(unauthorized.status_code(), 401);
    assert_security_headers(&unauthorized);

    let not_found = client.get("/does-not-exist").await;
    assert_eq!(not_found.status_code(), 404);
    assert_security_headers(&not_found);

    let bad_body = client
        .post(&api_path("/auth/login"))
        .json(&json!({ "nope": true }))
        .await;
    assert_eq!(bad_body.status_code(), 400);
    assert_security_headers(&bad_body);
}

#[tokio::test]
async fn test_headers_when_form_body_too_large() {
    let app = setup_test_app_with(|config| {
        config.security.max_form_body_bytes = 64;
    })
    .await;

    let response = app
        .client()
        .post(&api_path("/auth/login"))
        .text(format!("email={}", "a".repeat(256)))
        .content_type("application/x-www-form-urlencoded")
        .await;

    assert_eq!(response.status_code(), 413);
    assert_security_headers(&response);
}

#[tokio::test]
async fn test_configured_csp_is_sent() {
    let app = setup_test_app_with(|config| {
        config.security.content_security_policy = "default-src 'none'".to_string();
    })
    .await;

    let response = app.client().get(&api_path("/health")).await;

    assert_eq!(response.header("content-security-policy"), "default-src 'none'");
}

#[tokio::test]
async fn test_authorization_header_passes_untouched() {
    let app = setup_test_app().await;
    let client = app.client();
    let token = login_test_user(client).await;

    // A token altered by the filter would fail signature verification.
    let response = client
        .get(&api_path("/auth/me"))
        .add_header("Authorization", bearer(&token))
        .add_header("X-Note", "<script>alert(1)</script>hello")
        .await;

    assert_eq!(response.status_code(), 200);
    assert_security_headers(&response);
}

#[tokio::test]
async fn test_cors_preflight_carries_headers() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .method(axum::http::Method::OPTIONS, &api_path("/auth/login"))
        .add_header("Origin", "https://docs.example.com")
        .add_header("Access-Control-Request-Method", "POST")
        .await;

    assert!(response.status_code().is_success());
    assert_security_headers(&response);
}

#[tokio::test]
async fn test_query_is_sanitized_before_handlers() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get(&api_path("/health"))
        .add_query_param("q", "<script>alert(1)</script>")
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}
