//! YNAB Client
//!
//! Authenticated access to the YNAB API with token refresh and rate-limit
//! accounting.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{create_transport, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::error::{ApiError, ProtocolError, YnabResult};
use crate::resilience::{RateLimitConfig, RateLimitTracker};
use crate::token::{
    MemoryTokenStorage, StaticTokenProvider, TokenManager, TokenManagerOptions, TokenProvider,
    TokenStorage,
};
use crate::types::{OAuthConfig, Token};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.youneedabudget.com/v1";

/// Transport that attaches a bearer token and recovers once from a 401.
///
/// On a 401 the provider is asked for a new token and the request is sent
/// exactly once more. The caller sees the retried response, or the original 401
/// when the refresh itself fails.
pub struct AuthenticatedTransport {
    provider: Arc<dyn TokenProvider>,
    inner: Arc<dyn HttpTransport>,
}

impl AuthenticatedTransport {
    pub fn new(provider: Arc<dyn TokenProvider>, inner: Arc<dyn HttpTransport>) -> Self {
        Self { provider, inner }
    }

    pub fn provider(&self) -> &Arc<dyn TokenProvider> {
        &self.provider
    }

    fn authorize(request: &HttpRequest, access_token: &str) -> HttpRequest {
        request
            .clone()
            .header("authorization", format!("Bearer {}", access_token))
    }
}

#[async_trait]
impl HttpTransport for AuthenticatedTransport {
    async fn send(&self, request: HttpRequest) -> YnabResult<HttpResponse> {
        let access_token = self.provider.access_token().await?;
        let response = self
            .inner
            .send(Self::authorize(&request, &access_token))
            .await?;

        if response.status != 401 {
            return Ok(response);
        }

        tracing::debug!(url = %request.url, "Request unauthorized, refreshing token");
        match self.provider.refresh().await {
            Ok(access_token) => {
                self.inner
                    .send(Self::authorize(&request, &access_token))
                    .await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh after 401 failed");
                Ok(response)
            }
        }
    }
}

impl std::fmt::Debug for AuthenticatedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedTransport")
            .field("authenticated", &self.provider.is_authenticated())
            .finish()
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL.
    pub base_url: String,
    /// Rate limits to account against.
    pub rate_limit: RateLimitConfig,
    /// Per-request timeout; the transport default applies when unset.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit: RateLimitConfig::default(),
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// YNAB API client.
///
/// Resource services build on the JSON verbs here. Every successful request is
/// recorded in the shared [`RateLimitTracker`].
pub struct YnabClient {
    config: ClientConfig,
    transport: AuthenticatedTransport,
    rate_limiter: Arc<RateLimitTracker>,
}

impl YnabClient {
    /// Client authenticated with a personal access token.
    pub fn new(access_token: impl Into<String>) -> YnabResult<Self> {
        let config = ClientConfig::default();
        let transport = Arc::new(create_transport(config.timeout)?);
        let provider = Arc::new(StaticTokenProvider::new(access_token));
        Ok(Self::from_parts(config, provider, transport))
    }

    /// Client driven by an existing token manager.
    pub fn with_oauth(manager: Arc<TokenManager>) -> YnabResult<Self> {
        let config = ClientConfig::default();
        let transport = Arc::new(create_transport(config.timeout)?);
        Ok(Self::from_parts(config, manager, transport))
    }

    /// Client seeded with an OAuth token held in memory.
    pub fn from_token(oauth_config: OAuthConfig, token: Token) -> YnabResult<Self> {
        let storage = Arc::new(MemoryTokenStorage::with_token(token.clone()));
        Self::build_oauth(oauth_config, storage, Some(token))
    }

    /// Client whose OAuth token is loaded from storage on first use.
    pub fn from_storage(
        oauth_config: OAuthConfig,
        storage: Arc<dyn TokenStorage>,
    ) -> YnabResult<Self> {
        Self::build_oauth(oauth_config, storage, None)
    }

    /// Assemble a client from explicit parts.
    pub fn from_parts(
        config: ClientConfig,
        provider: Arc<dyn TokenProvider>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimitTracker::new(config.rate_limit));
        Self {
            config,
            transport: AuthenticatedTransport::new(provider, transport),
            rate_limiter,
        }
    }

    fn build_oauth(
        oauth_config: OAuthConfig,
        storage: Arc<dyn TokenStorage>,
        token: Option<Token>,
    ) -> YnabResult<Self> {
        let config = ClientConfig::default();
        let transport: Arc<dyn HttpTransport> = Arc::new(create_transport(config.timeout)?);
        let mut manager = TokenManager::new(
            oauth_config,
            transport.clone(),
            TokenManagerOptions::default().with_storage(storage),
        );
        if let Some(token) = token {
            manager = manager.with_initial_token(token);
        }
        Ok(Self::from_parts(config, Arc::new(manager), transport))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Token source used for requests.
    pub fn token_provider(&self) -> &Arc<dyn TokenProvider> {
        self.transport.provider()
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimitTracker> {
        &self.rate_limiter
    }

    pub fn requests_remaining(&self) -> usize {
        self.rate_limiter.requests_remaining()
    }

    pub fn requests_in_window(&self) -> usize {
        self.rate_limiter.requests_in_window()
    }

    pub fn time_until_reset(&self) -> Duration {
        self.rate_limiter.time_until_reset()
    }

    pub fn is_at_limit(&self) -> bool {
        self.rate_limiter.is_at_limit()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> YnabResult<T> {
        self.request(HttpMethod::Get, path, None).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> YnabResult<T> {
        self.request(HttpMethod::Post, path, Some(encode(body)?))
            .await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> YnabResult<T> {
        self.request(HttpMethod::Put, path, Some(encode(body)?))
            .await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> YnabResult<T> {
        self.request(HttpMethod::Patch, path, Some(encode(body)?))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> YnabResult<T> {
        self.request(HttpMethod::Delete, path, None).await
    }

    /// Send an authenticated request and decode the JSON response.
    ///
    /// Non-2xx responses become [`ApiError`]s; an empty body decodes as `null`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<String>,
    ) -> YnabResult<T> {
        let mut request = HttpRequest::new(method, self.url(path)).header("accept", "application/json");
        if let Some(body) = body {
            request = request
                .header("content-type", "application/json")
                .body(body);
        }
        request.timeout = self.config.timeout;

        tracing::debug!(method = method.as_str(), path = %path, "Sending API request");
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            let error = ApiError::from_response(response.status, &response.body);
            tracing::debug!(status = response.status, error_id = %error.id, "API request failed");
            return Err(error.into());
        }

        self.rate_limiter.record_request();

        let body = if response.body.trim().is_empty() {
            "null"
        } else {
            response.body.as_str()
        };
        serde_json::from_str(body).map_err(|e| {
            ProtocolError::InvalidJson {
                message: e.to_string(),
            }
            .into()
        })
    }

    fn url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> YnabResult<String> {
    serde_json::to_string(body).map_err(|e| {
        ProtocolError::InvalidJson {
            message: e.to_string(),
        }
        .into()
    })
}

impl std::fmt::Debug for YnabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YnabClient")
            .field("base_url", &self.config.base_url)
            .field("transport", &self.transport)
            .field("rate_limiter", &self.rate_limiter)
            .finish()
    }
}
