//! Integration tests for the authenticated API client

use std::sync::Arc;
use std::time::Duration;

use integrations_ynab::{
    ClientConfig, RateLimitConfig, StaticTokenProvider, Token, TokenManager, TokenManagerOptions,
    YnabClient,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer};

use crate::common::*;

fn static_client(server: &MockServer, config: ClientConfig) -> YnabClient {
    YnabClient::from_parts(
        config.with_base_url(server.uri()),
        Arc::new(StaticTokenProvider::new("test-api-key")),
        transport(),
    )
}

fn oauth_client(server: &MockServer) -> YnabClient {
    let manager = TokenManager::new(
        oauth_config(server),
        transport(),
        TokenManagerOptions::default(),
    )
    .with_initial_token(
        Token::new("old")
            .with_refresh_token("refresh-1")
            .with_expires_in(7200),
    );
    YnabClient::from_parts(
        ClientConfig::default().with_base_url(server.uri()),
        Arc::new(manager),
        transport(),
    )
}

async fn mount_refresh(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(success_response(json!({
            "access_token": "new",
            "refresh_token": "refresh-2",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_get_with_bearer_token() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(header("Accept", "application/json"))
        .respond_with(success_response(json!({"data": {"user": {"id": "user-1"}}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = static_client(&server, ClientConfig::default());
    let body: Value = client.get("/user").await.unwrap();

    assert_eq!(body["data"]["user"]["id"], "user-1");
    assert_eq!(client.requests_in_window(), 1);
    assert_eq!(client.requests_remaining(), 199);
}

#[tokio::test]
async fn test_post_json_body() {
    let server = setup_mock_server().await;
    let payload = json!({"transaction": {"account_id": "a1", "amount": -12000}});

    Mock::given(method("POST"))
        .and(path("/budgets/last-used/transactions"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(&payload))
        .respond_with(success_response(json!({"data": {"transaction_ids": ["t1"]}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = static_client(&server, ClientConfig::default());
    let body: Value = client
        .post("/budgets/last-used/transactions", &payload)
        .await
        .unwrap();

    assert_eq!(body["data"]["transaction_ids"][0], "t1");
}

#[tokio::test]
async fn test_api_error_classification() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/budgets"))
        .respond_with(api_error_response(403, "403.1", "subscription_lapsed"))
        .mount(&server)
        .await;

    let client = static_client(&server, ClientConfig::default());
    let err = client.get::<Value>("/budgets").await.unwrap_err();

    let api = err.api_error().unwrap();
    assert!(api.is_subscription_lapsed());
    assert!(api.requires_user_action());
    assert_eq!(client.requests_in_window(), 0);
}

#[tokio::test]
async fn test_401_refreshes_and_retries() {
    let server = setup_mock_server().await;
    mount_refresh(&server).await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("Authorization", "Bearer old"))
        .respond_with(api_error_response(401, "401", "unauthorized"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("Authorization", "Bearer new"))
        .respond_with(success_response(json!({"data": {"user": {"id": "user-1"}}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = oauth_client(&server);
    let body: Value = client.get("/user").await.unwrap();

    assert_eq!(body["data"]["user"]["id"], "user-1");
    assert!(client.token_provider().is_authenticated());
}

#[tokio::test]
async fn test_401_retry_failure_is_what_caller_sees() {
    let server = setup_mock_server().await;
    mount_refresh(&server).await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("Authorization", "Bearer old"))
        .respond_with(api_error_response(401, "401", "unauthorized"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("Authorization", "Bearer new"))
        .respond_with(api_error_response(503, "503", "service_unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let client = oauth_client(&server);
    let err = client.get::<Value>("/user").await.unwrap_err();

    let api = err.api_error().unwrap();
    assert_eq!(api.id, "503");
    assert!(api.is_service_unavailable());
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_rate_limit_accounting() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(success_response(json!({"data": {}})))
        .expect(3)
        .mount(&server)
        .await;

    let client = static_client(
        &server,
        ClientConfig::default().with_rate_limit(RateLimitConfig {
            limit: 2,
            window: Duration::from_secs(3600),
        }),
    );

    for _ in 0..2 {
        let _: Value = client.get("/user").await.unwrap();
    }
    assert!(client.is_at_limit());
    assert_eq!(client.requests_remaining(), 0);
    assert!(client.time_until_reset() <= Duration::from_secs(3600));

    // Accounting only: the request still goes out.
    let _: Value = client.get("/user").await.unwrap();
    assert_eq!(client.requests_in_window(), 3);

    client.rate_limiter().reset();
    assert_eq!(client.requests_remaining(), 2);
}
