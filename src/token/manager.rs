//! Token Manager
//!
//! Owns the current token: hydration from storage, code exchange and refresh
//! against the token endpoint, persistence and refresh notification.

use secrecy::ExposeSecret;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

use crate::core::{HttpMethod, HttpRequest, HttpTransport, ReqwestHttpTransport};
use crate::error::{
    parse_oauth_error, ProtocolError, ProviderError, TokenError, YnabError, YnabResult,
};
use crate::token::TokenStorage;
use crate::types::{GrantType, OAuthConfig, Token, TokenResponse, DEFAULT_EXPIRES_IN, EXPIRY_BUFFER};

/// Callback invoked with every token obtained by a refresh.
pub type RefreshCallback = Arc<dyn Fn(&Token) + Send + Sync>;

/// Token manager configuration.
#[derive(Debug, Clone)]
pub struct TokenManagerConfig {
    /// Tokens expiring within this window are refreshed (default: 5 minutes).
    pub refresh_buffer: Duration,
    /// Lifetime assumed when the token endpoint omits `expires_in` (default: 2 hours).
    pub default_expires_in: u64,
    /// Timeout for token endpoint requests.
    pub timeout: Option<Duration>,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            refresh_buffer: EXPIRY_BUFFER,
            default_expires_in: DEFAULT_EXPIRES_IN,
            timeout: None,
        }
    }
}

/// Optional collaborators for a [`TokenManager`].
#[derive(Default, Clone)]
pub struct TokenManagerOptions {
    pub config: TokenManagerConfig,
    /// Backing store; tokens are persisted on every install when present.
    pub storage: Option<Arc<dyn TokenStorage>>,
    pub on_refresh: Option<RefreshCallback>,
}

impl TokenManagerOptions {
    pub fn with_config(mut self, config: TokenManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn TokenStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_refresh_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Token) + Send + Sync + 'static,
    {
        self.on_refresh = Some(Arc::new(callback));
        self
    }
}

enum TokenGrant<'a> {
    AuthorizationCode { code: &'a str },
    RefreshToken { refresh_token: &'a str },
}

impl TokenGrant<'_> {
    fn grant_type(&self) -> GrantType {
        match self {
            Self::AuthorizationCode { .. } => GrantType::AuthorizationCode,
            Self::RefreshToken { .. } => GrantType::RefreshToken,
        }
    }
}

/// Token lifecycle manager.
///
/// The current token sits behind a lock that is never held across network or
/// storage I/O. Refreshes are single-flight: callers that find the token
/// expired queue on `refresh_lock` and reuse the token installed by whichever
/// caller refreshed first.
pub struct TokenManager {
    oauth_config: OAuthConfig,
    manager_config: TokenManagerConfig,
    transport: Arc<dyn HttpTransport>,
    storage: Option<Arc<dyn TokenStorage>>,
    on_refresh: Option<RefreshCallback>,
    current: RwLock<Option<Token>>,
    refresh_lock: AsyncMutex<()>,
}

impl TokenManager {
    /// Create a token manager.
    pub fn new(
        oauth_config: OAuthConfig,
        transport: Arc<dyn HttpTransport>,
        options: TokenManagerOptions,
    ) -> Self {
        Self {
            oauth_config,
            manager_config: options.config,
            transport,
            storage: options.storage,
            on_refresh: options.on_refresh,
            current: RwLock::new(None),
            refresh_lock: AsyncMutex::new(()),
        }
    }

    /// Install an initial token without persisting it.
    pub fn with_initial_token(self, token: Token) -> Self {
        self.install(Some(token));
        self
    }

    /// Create a token manager over the default reqwest transport.
    pub fn with_defaults(
        oauth_config: OAuthConfig,
        options: TokenManagerOptions,
    ) -> YnabResult<Self> {
        let transport = Arc::new(ReqwestHttpTransport::new()?);
        Ok(Self::new(oauth_config, transport, options))
    }

    /// Get the OAuth configuration.
    pub fn config(&self) -> &OAuthConfig {
        &self.oauth_config
    }

    /// Get the manager configuration.
    pub fn manager_config(&self) -> &TokenManagerConfig {
        &self.manager_config
    }

    /// Get the backing storage, if any.
    pub fn storage(&self) -> Option<&Arc<dyn TokenStorage>> {
        self.storage.as_ref()
    }

    /// Snapshot of the in-memory token, without hydration or refresh.
    pub fn current_token(&self) -> Option<Token> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, token: Option<Token>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn is_usable(&self, token: &Token) -> bool {
        !token.access_token.is_empty()
            && !token.is_expired_with_buffer(self.manager_config.refresh_buffer)
    }

    /// Replace the current token and persist it.
    ///
    /// The in-memory token is replaced even when persisting fails.
    pub async fn set_token(&self, token: Token) -> YnabResult<()> {
        self.install(Some(token.clone()));
        if let Some(storage) = &self.storage {
            storage.save_token(&token).await?;
        }
        Ok(())
    }

    /// Get a usable token, loading it from storage or refreshing it as needed.
    pub async fn get_token(&self) -> YnabResult<Token> {
        if self.current_token().is_none() {
            self.hydrate().await;
        }

        let token = self.current_token().ok_or(TokenError::NotAvailable)?;
        if self.is_usable(&token) {
            return Ok(token);
        }
        if !token.can_refresh() {
            return Err(TokenError::Expired.into());
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while this one waited.
        let token = self.current_token().ok_or(TokenError::NotAvailable)?;
        if self.is_usable(&token) {
            return Ok(token);
        }
        if !token.can_refresh() {
            return Err(TokenError::Expired.into());
        }

        self.refresh_locked(&token)
            .await
            .map_err(|e| TokenError::RefreshFailed(Box::new(e)).into())
    }

    /// Get just the access token string.
    pub async fn access_token(&self) -> YnabResult<String> {
        Ok(self.get_token().await?.access_token)
    }

    /// Exchange an authorization code for a token.
    ///
    /// The returned token is not installed; pass it to [`TokenManager::set_token`].
    pub async fn exchange_code(&self, code: &str) -> YnabResult<Token> {
        self.oauth_config.validate()?;
        self.request_token(TokenGrant::AuthorizationCode { code })
            .await
    }

    /// Force a refresh of the current token.
    ///
    /// Used when the API rejects a token that still looks valid locally. If a
    /// concurrent caller installed a different token while this one waited,
    /// that token is returned without another exchange.
    pub async fn refresh_token(&self) -> YnabResult<Token> {
        let observed = self.current_token().ok_or(TokenError::NotAvailable)?;
        if !observed.can_refresh() {
            return Err(TokenError::NoRefreshToken.into());
        }

        let _guard = self.refresh_lock.lock().await;

        let token = self.current_token().ok_or(TokenError::NotAvailable)?;
        if token.access_token != observed.access_token && self.is_usable(&token) {
            return Ok(token);
        }
        if !token.can_refresh() {
            return Err(TokenError::NoRefreshToken.into());
        }

        self.refresh_locked(&token).await
    }

    /// Drop the current token from memory and storage.
    pub async fn clear_token(&self) -> YnabResult<()> {
        self.install(None);
        if let Some(storage) = &self.storage {
            storage.clear_token().await?;
        }
        Ok(())
    }

    /// In-memory token exists and is valid. Does not consult storage.
    pub fn is_authenticated(&self) -> bool {
        self.current_token()
            .map(|t| self.is_usable(&t))
            .unwrap_or(false)
    }

    async fn hydrate(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        match storage.load_token().await {
            Ok(token) => {
                let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
                if current.is_none() {
                    *current = Some(token);
                    tracing::debug!("Token loaded from storage");
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "No token loaded from storage");
            }
        }
    }

    /// Refresh with the refresh lock held: exchange, persist, notify.
    async fn refresh_locked(&self, token: &Token) -> YnabResult<Token> {
        let refresh_token = token.refresh_token.as_deref().unwrap_or_default();
        let mut refreshed = self
            .request_token(TokenGrant::RefreshToken { refresh_token })
            .await?;

        if !refreshed.can_refresh() {
            refreshed.refresh_token = token.refresh_token.clone();
        }

        self.set_token(refreshed.clone()).await?;
        tracing::info!(expires_in = refreshed.expires_in, "Access token refreshed");

        if let Some(callback) = &self.on_refresh {
            callback(&refreshed);
        }

        Ok(refreshed)
    }

    fn token_form(&self, grant: &TokenGrant<'_>) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", grant.grant_type().as_str());
        form.append_pair("client_id", &self.oauth_config.client_id);
        form.append_pair(
            "client_secret",
            self.oauth_config.client_secret.expose_secret(),
        );
        match grant {
            TokenGrant::AuthorizationCode { code } => {
                form.append_pair("code", code);
                form.append_pair("redirect_uri", &self.oauth_config.redirect_uri);
            }
            TokenGrant::RefreshToken { refresh_token } => {
                form.append_pair("refresh_token", refresh_token);
            }
        }
        form.finish()
    }

    async fn request_token(&self, grant: TokenGrant<'_>) -> YnabResult<Token> {
        let grant_type = grant.grant_type();

        let mut request = HttpRequest::new(HttpMethod::Post, &self.oauth_config.token_url)
            .header("content-type", "application/x-www-form-urlencoded")
            .header("accept", "application/json")
            .body(self.token_form(&grant));
        request.timeout = self.manager_config.timeout;

        tracing::debug!(grant_type = grant_type.as_str(), "Requesting token");
        let response = self.transport.send(request).await?;

        if let Some(error) = parse_oauth_error(&response.body) {
            tracing::warn!(
                grant_type = grant_type.as_str(),
                status = response.status,
                error = %error.error,
                "Token endpoint returned an error"
            );
            return Err(YnabError::OAuth(error));
        }

        if !response.is_success() {
            return Err(ProviderError::HttpStatus {
                status: response.status,
                body: response.body,
            }
            .into());
        }

        let token_response: TokenResponse =
            serde_json::from_str(&response.body).map_err(|e| ProtocolError::InvalidJson {
                message: e.to_string(),
            })?;

        if token_response.access_token.is_empty() {
            return Err(ProtocolError::MissingField {
                field: "access_token".to_string(),
            }
            .into());
        }

        Ok(token_response.into_token(self.manager_config.default_expires_in))
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("oauth_config", &self.oauth_config)
            .field("manager_config", &self.manager_config)
            .field("has_storage", &self.storage.is_some())
            .field("current", &self.current_token())
            .finish()
    }
}
