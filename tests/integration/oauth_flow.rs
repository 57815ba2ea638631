//! Integration tests for the authorization flows and token refresh

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use integrations_ynab::{
    EncryptedFileTokenStorage, FileTokenStorage, FlowManager, ProviderError, StorageError, Token,
    TokenManagerOptions, TokenStorage, YnabError,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::*;

#[tokio::test]
async fn test_authorization_code_callback_exchanges_code() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc"))
        .and(body_string_contains("client_id=test-client"))
        .and(body_string_contains("client_secret=test-secret"))
        .respond_with(success_response(json!({
            "access_token": "X",
            "token_type": "Bearer",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;

    let flows = FlowManager::new(token_manager(&server, TokenManagerOptions::default()));
    let token = flows
        .complete_authorization_code_flow(&format!("{}?code=abc&state=S", REDIRECT_URI), "S")
        .await
        .unwrap();

    assert_eq!(token.access_token, "X");
    assert!(!token.can_refresh());
    assert!(flows.token_manager().is_authenticated());
}

#[tokio::test]
async fn test_token_endpoint_error_is_structured() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "The authorization code has expired"
        })))
        .mount(&server)
        .await;

    let flows = FlowManager::new(token_manager(&server, TokenManagerOptions::default()));
    let err = flows
        .complete_authorization_code_flow(&format!("{}?code=stale&state=S", REDIRECT_URI), "S")
        .await
        .unwrap_err();

    let oauth = err.oauth_error().unwrap();
    assert_eq!(oauth.error, "invalid_grant");
    assert!(err.needs_reauth());
    assert!(flows.token_manager().current_token().is_none());
}

#[tokio::test]
async fn test_token_endpoint_redirect_is_not_followed() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(307)
                .insert_header("Location", format!("{}/elsewhere", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/elsewhere"))
        .respond_with(success_response(json!({"access_token": "leaked"})))
        .expect(0)
        .mount(&server)
        .await;

    let manager = token_manager(&server, TokenManagerOptions::default());
    let err = manager.exchange_code("abc").await.unwrap_err();

    assert!(matches!(
        err,
        YnabError::Provider(ProviderError::HttpStatus { status: 307, .. })
    ));
}

#[tokio::test]
async fn test_implicit_callback_makes_no_request() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let flows = FlowManager::new(token_manager(&server, TokenManagerOptions::default()));
    let token = flows
        .complete_implicit_grant_flow(
            &format!(
                "{}#access_token=tok123&token_type=Bearer&expires_in=7200&state=S",
                REDIRECT_URI
            ),
            "S",
        )
        .await
        .unwrap();

    assert_eq!(token.access_token, "tok123");
    assert!(!token.can_refresh());
}

#[tokio::test]
async fn test_expired_token_refresh_persists_and_notifies() {
    let server = setup_mock_server().await;
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("ynab").join("token.json");

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(success_response(json!({
            "access_token": "fresh",
            "refresh_token": "refresh-2",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(FileTokenStorage::new(&token_path));
    let expiring = Token::new("stale")
        .with_refresh_token("refresh-1")
        .with_expires_in(60);
    storage.save_token(&expiring).await.unwrap();

    let refreshes = Arc::new(AtomicUsize::new(0));
    let counter = refreshes.clone();
    let options = TokenManagerOptions::default()
        .with_storage(storage)
        .with_refresh_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    let manager = token_manager(&server, options);

    let token = manager.get_token().await.unwrap();
    assert_eq!(token.access_token, "fresh");
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);

    let persisted = FileTokenStorage::new(&token_path).load_token().await.unwrap();
    assert_eq!(persisted.access_token, "fresh");
    assert_eq!(persisted.refresh_token.as_deref(), Some("refresh-2"));

    // Second call is served from memory.
    manager.get_token().await.unwrap();
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_encrypted_storage_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.enc");

    let storage = EncryptedFileTokenStorage::new(&token_path, b"integration-key").unwrap();
    storage
        .save_token(&Token::new("secret-token").with_expires_in(7200))
        .await
        .unwrap();

    let raw = std::fs::read(&token_path).unwrap();
    assert!(!String::from_utf8_lossy(&raw).contains("secret-token"));

    let reopened = EncryptedFileTokenStorage::new(&token_path, b"integration-key").unwrap();
    assert_eq!(reopened.load_token().await.unwrap().access_token, "secret-token");

    let wrong = EncryptedFileTokenStorage::new(&token_path, b"other-key").unwrap();
    assert!(matches!(
        wrong.load_token().await.unwrap_err(),
        YnabError::Storage(StorageError::DecryptionFailed { .. })
    ));
}
