//! Common test utilities for integration tests

#![allow(dead_code, unreachable_pub)]

use salesdesk_client::ApiClient;
use salesdesk_core::config::ApiConfig;
use serde_json::{Value, json};
use std::sync::Once;
use wiremock::MockServer;

static INIT_LOGGER: Once = Once::new();

/// Initialize test logging once per process
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

/// Start a mock backend and a client pointed at it
pub async fn start_backend() -> anyhow::Result<(MockServer, ApiClient)> {
    init_test_logging();

    let server = MockServer::start().await;
    let config = ApiConfig {
        base_url: format!("{}/", server.uri()),
        timeout_secs: 5,
        connect_timeout_secs: 2,
    };
    let client = ApiClient::new(&config)?;
    Ok((server, client))
}

/// Login response body for `role`
pub fn session_body(role: &str) -> Value {
    json!({
        "token": "tok-123",
        "user": {"id": 5, "username": "asha", "email": "asha@acme.test", "role": role}
    })
}

/// Scope body with two projects
pub fn scope_body() -> Value {
    json!({
        "projects": [
            {"id": 1, "name": "Skyline", "units": [{"id": 10}]},
            {"id": 2, "name": "Harbor", "units": []}
        ]
    })
}

/// One lead record
pub fn lead(status: &str, partner: Option<i64>) -> Value {
    match partner {
        Some(id) => json!({"status_name": status, "source_name": "Channel Partner", "channel_partner": id}),
        None => json!({"status_name": status, "source_name": "Website"}),
    }
}
