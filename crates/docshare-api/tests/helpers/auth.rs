use super::api_path;
use axum_test::TestServer;
use serde_json::{json, Value};

pub const TEST_EMAIL: &str = "test@example.com";
pub const TEST_PASSWORD: &str = "TestPassword123!";

/// Log the bootstrap user in and return the bearer token.
pub async fn login_test_user(client: &TestServer) -> String {
    let response = client
        .post(&api_path("/auth/login"))
        .json(&json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    body["token"]
        .as_str()
        .expect("login response has no token")
        .to_string()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
