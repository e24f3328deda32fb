//! Test helpers: build AppState and router for integration tests.
//!
//! Everything runs in process: memory rate store, memory sessions, and a
//! mailer that records codes instead of sending them.

#![allow(dead_code)]

pub mod fixtures;
pub mod mailer;

use std::sync::Arc;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use ledgerlens_api::constants;
use ledgerlens_api::setup::{routes, services};
use ledgerlens_api::AppState;
use ledgerlens_core::IntakeConfig;
use ledgerlens_infra::MemoryRateStore;

pub use mailer::RecordingMailer;

pub const CLIENT_IP: &str = "203.0.113.7";

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

pub struct TestApp {
    pub server: TestServer,
    pub mailer: Arc<RecordingMailer>,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Upload `data` as `filename` from `ip`
    pub async fn upload_from(&self, ip: &str, filename: &str, data: Vec<u8>) -> TestResponse {
        let form = MultipartForm::new().add_part("file", Part::bytes(data).file_name(filename));
        self.server
            .post(&api_path("/uploads"))
            .add_header("x-forwarded-for", ip)
            .multipart(form)
            .await
    }

    pub async fn upload(&self, filename: &str, data: Vec<u8>) -> TestResponse {
        self.upload_from(CLIENT_IP, filename, data).await
    }

    /// Send a code and return the one the mailer captured
    pub async fn request_code(&self, email: &str) -> String {
        let response = self
            .server
            .post(&api_path("/verification/code"))
            .add_header("x-forwarded-for", CLIENT_IP)
            .json(&serde_json::json!({ "email": email }))
            .await;
        assert_eq!(response.status_code(), 200, "{}", response.text());
        self.mailer
            .last_code_for(email)
            .await
            .expect("mailer captured a code")
    }

    /// Full send + verify round; returns the email token
    pub async fn verified_token(&self, email: &str) -> String {
        let code = self.request_code(email).await;
        let response = self
            .server
            .post(&api_path("/verification/verify"))
            .add_header("x-forwarded-for", CLIENT_IP)
            .json(&serde_json::json!({ "email": email, "code": code }))
            .await;
        assert_eq!(response.status_code(), 200, "{}", response.text());
        let body: serde_json::Value = response.json();
        body["token"].as_str().expect("token in body").to_string()
    }
}

pub fn test_config() -> IntakeConfig {
    IntakeConfig::default()
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(test_config())
}

pub fn setup_test_app_with(config: IntakeConfig) -> TestApp {
    let mailer = Arc::new(RecordingMailer::default());
    let state = services::build_state(
        config.clone(),
        Arc::new(MemoryRateStore::new()),
        mailer.clone(),
    );
    let router = routes::setup_routes(&config, state.clone()).expect("routes");
    let server = TestServer::new(router).expect("test server");

    TestApp {
        server,
        mailer,
        state,
    }
}
