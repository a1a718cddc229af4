//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p docshare-api`.

#![allow(dead_code)]

pub mod auth;

use axum_test::TestServer;
use docshare_api::constants;
use docshare_api::setup::{build_state, routes};
use docshare_core::config::BootstrapUser;
use docshare_core::Config;
use tempfile::TempDir;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// API path prefix for tests (e.g. `/api/v0`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Test application: server plus the storage directory it writes into.
pub struct TestApp {
    pub server: TestServer,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn storage_path(&self) -> &std::path::Path {
        self._temp_dir.path()
    }
}

/// Development config with the test user seeded and storage in `storage_dir`.
pub fn test_config(storage_dir: &TempDir) -> Config {
    let mut config = Config::with_secret(TEST_SECRET);
    config.uploads.local_storage_path = storage_dir.path().to_string_lossy().into_owned();
    config.bootstrap_user = Some(BootstrapUser {
        email: auth::TEST_EMAIL.to_string(),
        password: auth::TEST_PASSWORD.to_string(),
        display_name: "Test User".to_string(),
    });
    config
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Setup test app after letting the caller adjust the config.
pub async fn setup_test_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = test_config(&temp_dir);
    customize(&mut config);

    let state = build_state(&config).await.expect("Failed to build state");
    let router = routes::setup_routes(&config, state).expect("Failed to setup routes");
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        _temp_dir: temp_dir,
    }
}
