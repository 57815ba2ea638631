//! Token Providers
//!
//! Source of the bearer token attached to API requests.

use async_trait::async_trait;
use std::sync::{PoisonError, RwLock};

use crate::error::{TokenError, YnabResult};
use crate::token::TokenManager;

/// Supplies access tokens to the authenticated transport.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get a usable access token.
    async fn access_token(&self) -> YnabResult<String>;

    /// Whether a usable token is available without I/O.
    fn is_authenticated(&self) -> bool;

    /// Obtain a new access token after the API rejected the current one.
    async fn refresh(&self) -> YnabResult<String> {
        Err(TokenError::RefreshUnsupported.into())
    }
}

#[async_trait]
impl TokenProvider for TokenManager {
    async fn access_token(&self) -> YnabResult<String> {
        TokenManager::access_token(self).await
    }

    fn is_authenticated(&self) -> bool {
        TokenManager::is_authenticated(self)
    }

    async fn refresh(&self) -> YnabResult<String> {
        Ok(self.refresh_token().await?.access_token)
    }
}

/// Fixed personal access token, swappable at runtime.
pub struct StaticTokenProvider {
    token: RwLock<String>,
}

impl StaticTokenProvider {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(access_token.into()),
        }
    }

    /// Replace the token used for subsequent requests.
    pub fn set_access_token(&self, access_token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = access_token.into();
    }

    fn current(&self) -> String {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> YnabResult<String> {
        let token = self.current();
        if token.is_empty() {
            return Err(TokenError::NotAvailable.into());
        }
        Ok(token)
    }

    fn is_authenticated(&self) -> bool {
        !self.current().is_empty()
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"[REDACTED]")
            .finish()
    }
}
