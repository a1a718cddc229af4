//! Upload pre-flight integration tests.
//!
//! Run with: `cargo test -p docshare-api --test uploads_test`

mod helpers;

use helpers::auth::{bearer, login_test_user};
use helpers::{api_path, setup_test_app};
use serde_json::{json, Value};

async fn check(client: &axum_test::TestServer, token: &str, name: &str, mime: &str) -> bool {
    let response = client
        .post(&api_path("/uploads/check"))
        .add_header("Authorization", bearer(token))
        .json(&json!({ "fileName": name, "mimeType": mime }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    body["accepted"].as_bool().expect("accepted flag")
}

#[tokio::test]
async fn test_check_accepts_safe_documents() {
    let app = setup_test_app().await;
    let client = app.client();
    let token = login_test_user(client).await;

    assert!(check(client, &token, "report.pdf", "application/pdf").await);
    assert!(check(client, &token, "Quarterly Report (final).docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document").await);
    assert!(check(client, &token, "résumé.pdf", "application/pdf; charset=binary").await);
    assert!(check(client, &token, "документ.txt", "TEXT/PLAIN").await);
    assert!(check(client, &token, "报告.png", "image/png").await);
}

#[tokio::test]
async fn test_check_rejects_traversal_and_dangerous_types() {
    let app = setup_test_app().await;
    let client = app.client();
    let token = login_test_user(client).await;

    for name in [
        "../../etc/passwd",
        "..%2F..%2Fetc%2Fpasswd",
        "%252e%252e%252fsecret.txt",
        "/etc/passwd",
        "C:\\Windows\\win.ini",
        "report.pdf; rm -rf /",
        "archive.tar.gz",
        "",
    ] {
        assert!(!check(client, &token, name, "application/pdf").await, "accepted {:?}", name);
    }

    for mime in [
        "application/x-msdownload",
        "application/x-sh",
        "application/javascript",
        "text/javascript",
        "application/x-php",
        "text/html",
        "application/octet-stream",
    ] {
        assert!(!check(client, &token, "report.pdf", mime).await, "accepted {:?}", mime);
    }
}

#[tokio::test]
async fn test_sanitize_name() {
    let app = setup_test_app().await;
    let client = app.client();
    let token = login_test_user(client).await;

    let response = client
        .post(&api_path("/uploads/sanitize-name"))
        .add_header("Authorization", bearer(&token))
        .json(&json!({ "fileName": "malicious../../../file.php" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["safeName"], "maliciousfile.php");
}

#[tokio::test]
async fn test_upload_endpoints_require_token() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&api_path("/uploads/check"))
        .json(&json!({ "fileName": "report.pdf", "mimeType": "application/pdf" }))
        .await;

    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_sanitize_text() {
    let app = setup_test_app().await;
    let client = app.client();
    let token = login_test_user(client).await;

    let response = client
        .post(&api_path("/sanitize"))
        .add_header("Authorization", bearer(&token))
        .json(&json!({ "text": "<p onclick=\"steal()\">hi<script>alert(1)</script></p>" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(
        body["original"],
        "<p onclick=\"steal()\">hi<script>alert(1)</script></p>"
    );
    assert_eq!(body["cleaned"], "<p>hi</p>");
}
