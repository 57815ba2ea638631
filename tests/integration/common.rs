//! Shared helpers for integration tests.

use std::sync::Arc;

use integrations_ynab::{
    create_transport, HttpTransport, OAuthConfig, TokenManager, TokenManagerOptions,
};
use serde_json::Value;
use wiremock::{MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/oauth/token";
pub const REDIRECT_URI: &str = "https://app.example.com/callback";

pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// OAuth configuration whose endpoints point at the mock server.
pub fn oauth_config(server: &MockServer) -> OAuthConfig {
    OAuthConfig::new("test-client", "test-secret", REDIRECT_URI).with_endpoints(
        format!("{}/oauth/authorize", server.uri()),
        format!("{}{}", server.uri(), TOKEN_PATH),
    )
}

pub fn transport() -> Arc<dyn HttpTransport> {
    Arc::new(create_transport(None).expect("Failed to build transport"))
}

pub fn token_manager(server: &MockServer, options: TokenManagerOptions) -> Arc<TokenManager> {
    Arc::new(TokenManager::new(oauth_config(server), transport(), options))
}

pub fn success_response(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

pub fn api_error_response(status: u16, id: &str, name: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(serde_json::json!({
        "error": {"id": id, "name": name, "detail": "Mock API error"}
    }))
}
