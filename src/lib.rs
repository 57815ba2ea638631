//! YNAB Integration Module
//!
//! Core of a YNAB API client: OAuth2 token lifecycle and rate-limit accounting.
//!
//! # Features
//!
//! - Authorization Code and Implicit Grant flows
//! - Token refresh with single-flight deduplication
//! - Memory, file, encrypted-file and chained token storage
//! - Automatic refresh and retry on 401 responses
//! - Rolling-window rate-limit tracking (200 requests per hour)
//!
//! # Example
//!
//! ```rust,ignore
//! use integrations_ynab::{FlowManager, OAuthConfig, TokenManager, TokenManagerOptions, YnabClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OAuthConfig::from_env()?.with_read_only_scope();
//!     let manager = Arc::new(TokenManager::with_defaults(config, TokenManagerOptions::default())?);
//!     let flows = FlowManager::new(manager.clone());
//!
//!     let (url, state) = flows.start_authorization_code_flow()?;
//!     println!("Open: {}", url);
//!
//!     // ... receive the redirect ...
//!     # let callback_url = "";
//!     flows.complete_authorization_code_flow(callback_url, &state).await?;
//!
//!     let client = YnabClient::with_oauth(manager)?;
//!     let user: serde_json::Value = client.get("/user").await?;
//!     println!("{} requests left this hour", client.requests_remaining());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: tokens, OAuth configuration and callback parsing
//! - `error`: error hierarchy, OAuth and API error payloads
//! - `core`: HTTP transport and CSRF state
//! - `flows`: authorization flows
//! - `token`: storage, encryption, token manager and providers
//! - `resilience`: rate-limit tracking
//! - `client`: authenticated transport and API client

pub mod client;
pub mod core;
pub mod error;
pub mod flows;
pub mod resilience;
pub mod token;
pub mod types;

// Re-export main client
pub use client::{AuthenticatedTransport, ClientConfig, YnabClient, DEFAULT_BASE_URL};

// Re-export errors
pub use error::{
    get_user_message, parse_oauth_error, ApiError, AuthorizationError, ConfigurationError,
    NetworkError, OAuthErrorCode, OAuthErrorResponse, ProtocolError, ProviderError, StorageError,
    TokenError, YnabError, YnabResult,
};

// Re-export types
pub use types::{
    // Token
    GrantType, Token, TokenResponse, EXPIRY_BUFFER,
    // Config
    OAuthConfig, ResponseType, Scope, AUTHORIZE_URL, TOKEN_URL,
    // Callback
    CallbackResult,
};

// Re-export core components
pub use core::{
    // Transport
    create_mock_transport, create_transport, HttpMethod, HttpRequest, HttpResponse,
    HttpTransport, MockHttpTransport, ReqwestHttpTransport,
    // State
    generate_state, validate_state,
};

// Re-export flows
pub use flows::{recommend_flow, AuthorizationCodeFlow, Flow, FlowManager, ImplicitGrantFlow};

// Re-export token management
pub use token::{
    // Storage
    create_memory_token_storage, create_mock_token_storage, create_storage, default_token_path,
    ChainedTokenStorage, EncryptedFileTokenStorage, FileTokenStorage, MemoryTokenStorage,
    MockTokenStorage, StorageKind, StorageOptions, TokenStorage,
    // Encryption
    TokenCipher,
    // Manager
    RefreshCallback, TokenManager, TokenManagerConfig, TokenManagerOptions,
    // Providers
    StaticTokenProvider, TokenProvider,
};

// Re-export resilience
pub use resilience::{RateLimitConfig, RateLimitTracker, DEFAULT_RATE_LIMIT};
